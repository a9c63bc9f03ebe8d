use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use crate::{
    CollectionPath, Document, DocumentId, DocumentQuery, Fields, Result, StoreError,
    store::{DocumentStore, SnapshotStream, WriteOptions},
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// In-memory document store implementation for testing and local runs.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// fault injection so callers can exercise transport failures.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<CollectionPath, Vec<Document>>>>,
    changes: broadcast::Sender<CollectionPath>,
    offline: Arc<AtomicBool>,
    rejected_adds: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            changes,
            offline: Arc::new(AtomicBool::new(false)),
            rejected_adds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulates losing (or regaining) the network: while offline every
    /// call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every subsequent `add` whose fields contain `field == value`
    /// fail with `Unavailable`.
    pub fn reject_adds_where(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.rejected_adds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((field.into(), value.into()));
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.set_offline(false);
        self.rejected_adds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &CollectionPath) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network unreachable".to_string()));
        }
        Ok(())
    }

    fn is_rejected(&self, fields: &Fields) -> bool {
        self.rejected_adds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(name, value)| fields.get(name) == Some(value))
    }

    fn notify(&self, collection: &CollectionPath) {
        // No receivers just means nobody is subscribed.
        let _ = self.changes.send(collection.clone());
    }

    async fn snapshot(&self, collection: &CollectionPath) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn check_revision(document: &Document, options: WriteOptions) -> Result<()> {
    if let Some(expected) = options.expected_revision
        && document.revision != expected
    {
        return Err(StoreError::ConcurrencyConflict {
            collection: document.collection.clone(),
            id: document.id.clone(),
            expected,
            actual: document.revision,
        });
    }
    Ok(())
}

struct Subscription {
    store: InMemoryDocumentStore,
    collection: CollectionPath,
    receiver: broadcast::Receiver<CollectionPath>,
    primed: bool,
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<Document> {
        self.ensure_online()?;
        if self.is_rejected(&fields) {
            return Err(StoreError::Unavailable(format!(
                "write to {collection} rejected"
            )));
        }

        let document = Document::new(collection.clone(), DocumentId::generate(), fields);
        self.collections
            .write()
            .await
            .entry(collection.clone())
            .or_default()
            .push(document.clone());

        self.notify(collection);
        Ok(document)
    }

    async fn get(&self, collection: &CollectionPath, id: &DocumentId) -> Result<Option<Document>> {
        self.ensure_online()?;
        let store = self.collections.read().await;
        Ok(store
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id))
            .cloned())
    }

    async fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        fields: Fields,
        options: WriteOptions,
    ) -> Result<Document> {
        self.ensure_online()?;

        let updated = {
            let mut store = self.collections.write().await;
            let document = store
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| &d.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.clone(),
                    id: id.clone(),
                })?;

            check_revision(document, options)?;
            document.apply_update(fields);
            document.clone()
        };

        self.notify(collection);
        Ok(updated)
    }

    async fn delete(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        options: WriteOptions,
    ) -> Result<()> {
        self.ensure_online()?;

        {
            let mut store = self.collections.write().await;
            let not_found = || StoreError::NotFound {
                collection: collection.clone(),
                id: id.clone(),
            };
            let docs = store.get_mut(collection).ok_or_else(not_found)?;
            let index = docs
                .iter()
                .position(|d| &d.id == id)
                .ok_or_else(not_found)?;

            check_revision(&docs[index], options)?;
            docs.remove(index);
        }

        self.notify(collection);
        Ok(())
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        self.ensure_online()?;
        let store = self.collections.read().await;
        let matching = store
            .get(&query.collection)
            .into_iter()
            .flatten()
            .filter(|d| d.matches(&query.filters))
            .cloned();

        let documents = match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        };
        Ok(documents)
    }

    async fn subscribe(&self, collection: &CollectionPath) -> Result<SnapshotStream> {
        self.ensure_online()?;

        // Subscribe before the first read so no change can slip in between.
        let state = Subscription {
            store: self.clone(),
            collection: collection.clone(),
            receiver: self.changes.subscribe(),
            primed: false,
        };

        let stream = stream::unfold(state, |mut sub| async move {
            if !sub.primed {
                sub.primed = true;
                let snapshot = sub.store.snapshot(&sub.collection).await;
                return Some((Ok(snapshot), sub));
            }

            loop {
                match sub.receiver.recv().await {
                    Ok(changed) if changed == sub.collection => break,
                    Ok(_) => continue,
                    // Missed notifications are harmless: the next item is a full snapshot.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, collection = %sub.collection, "subscriber lagged");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }

            let snapshot = sub.store.snapshot(&sub.collection).await;
            Some((Ok(snapshot), sub))
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentStoreExt, Revision};
    use futures_util::StreamExt;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn cart() -> CollectionPath {
        CollectionPath::new("users/u1/cart")
    }

    #[tokio::test]
    async fn add_and_get_document() {
        let store = InMemoryDocumentStore::new();
        let doc = store
            .add(&cart(), fields(json!({"productId": "p1", "quantity": 1})))
            .await
            .unwrap();

        assert_eq!(doc.revision, Revision::first());
        let loaded = store.get(&cart(), &doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.field("productId"), Some(&json!("p1")));
        assert_eq!(store.document_count(&cart()).await, 1);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        let doc = store
            .add(&cart(), fields(json!({"productId": "p1", "quantity": 1})))
            .await
            .unwrap();

        let updated = store
            .update(
                &cart(),
                &doc.id,
                fields(json!({"quantity": 2})),
                WriteOptions::expect_revision(doc.revision),
            )
            .await
            .unwrap();

        assert_eq!(updated.revision, Revision::new(2));
        assert_eq!(updated.field("quantity"), Some(&json!(2)));
        assert_eq!(updated.field("productId"), Some(&json!("p1")));
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let store = InMemoryDocumentStore::new();
        let doc = store
            .add(&cart(), fields(json!({"quantity": 1})))
            .await
            .unwrap();
        store
            .update_field(&cart(), &doc.id, "quantity", json!(2))
            .await
            .unwrap();

        let result = store
            .update(
                &cart(),
                &doc.id,
                fields(json!({"quantity": 3})),
                WriteOptions::expect_revision(doc.revision),
            )
            .await;
        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));

        let result = store
            .delete(&cart(), &doc.id, WriteOptions::expect_revision(doc.revision))
            .await;
        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let id = DocumentId::new("nope");

        let result = store
            .update(&cart(), &id, Fields::new(), WriteOptions::new())
            .await;
        assert!(result.unwrap_err().is_not_found());

        let result = store.delete(&cart(), &id, WriteOptions::new()).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn query_filters_and_limits() {
        let store = InMemoryDocumentStore::new();
        for (product, status) in [("p1", "pending"), ("p2", "delivered"), ("p3", "pending")] {
            store
                .add(
                    &CollectionPath::orders(),
                    fields(json!({"productId": product, "status": status})),
                )
                .await
                .unwrap();
        }

        let pending = store
            .query(DocumentQuery::collection(CollectionPath::orders()).where_eq("status", "pending"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].field("productId"), Some(&json!("p1")));
        assert_eq!(pending[1].field("productId"), Some(&json!("p3")));

        let first = store
            .find_first(
                DocumentQuery::collection(CollectionPath::orders()).where_eq("status", "pending"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.field("productId"), Some(&json!("p1")));
    }

    #[tokio::test]
    async fn offline_store_rejects_every_call() {
        let store = InMemoryDocumentStore::new();
        store.set_offline(true);

        let result = store.add(&cart(), Fields::new()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(result.unwrap_err().is_transient());
        assert!(store.list(&cart()).await.is_err());

        store.clear_faults();
        assert!(store.add(&cart(), Fields::new()).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_adds_only_hit_matching_documents() {
        let store = InMemoryDocumentStore::new();
        store.reject_adds_where("productId", "p2");

        assert!(
            store
                .add(&cart(), fields(json!({"productId": "p1"})))
                .await
                .is_ok()
        );
        assert!(
            store
                .add(&cart(), fields(json!({"productId": "p2"})))
                .await
                .is_err()
        );
        assert_eq!(store.document_count(&cart()).await, 1);
    }

    #[tokio::test]
    async fn subscription_delivers_full_snapshots() {
        let store = InMemoryDocumentStore::new();
        store
            .add(&cart(), fields(json!({"productId": "p1"})))
            .await
            .unwrap();

        let mut stream = store.subscribe(&cart()).await.unwrap();
        let initial = stream.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        // Writes to other collections do not wake the subscriber.
        store
            .add(&CollectionPath::orders(), Fields::new())
            .await
            .unwrap();
        store
            .add(&cart(), fields(json!({"productId": "p2"})))
            .await
            .unwrap();

        let next = stream.next().await.unwrap().unwrap();
        assert_eq!(next.len(), 2);
    }
}
