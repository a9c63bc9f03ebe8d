use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{CollectionPath, Document, DocumentId, DocumentQuery, Fields, Result, Revision};

/// Options for updating or deleting a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Expected revision of the document for optimistic concurrency control.
    /// If None, the write is unconditional.
    pub expected_revision: Option<Revision>,
}

impl WriteOptions {
    /// Creates options with no revision check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the document to be at a specific revision.
    pub fn expect_revision(revision: Revision) -> Self {
        Self {
            expected_revision: Some(revision),
        }
    }
}

/// A live stream of full collection snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Vec<Document>>> + Send>>;

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Every call is a
/// suspension point; none of them block a shared thread.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document with a store-assigned ID.
    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<Document>;

    /// Loads a document by ID.
    async fn get(&self, collection: &CollectionPath, id: &DocumentId) -> Result<Option<Document>>;

    /// Merges `fields` into an existing document.
    ///
    /// Fails with `NotFound` if the document is missing and with
    /// `ConcurrencyConflict` if `options.expected_revision` does not match.
    async fn update(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        fields: Fields,
        options: WriteOptions,
    ) -> Result<Document>;

    /// Deletes a document.
    ///
    /// Fails with `NotFound` if the document is missing and with
    /// `ConcurrencyConflict` if `options.expected_revision` does not match.
    async fn delete(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        options: WriteOptions,
    ) -> Result<()>;

    /// Retrieves documents matching a query, in insertion order.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Opens a live subscription to a collection.
    ///
    /// The stream yields the whole collection right away and again after
    /// every change to it. Consumers must treat each item as a replacement
    /// for the previous one.
    async fn subscribe(&self, collection: &CollectionPath) -> Result<SnapshotStream>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Returns every document of a collection.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        self.query(DocumentQuery::collection(collection.clone()))
            .await
    }

    /// Returns the first document matching a query.
    async fn find_first(&self, query: DocumentQuery) -> Result<Option<Document>> {
        Ok(self.query(query.limit(1)).await?.into_iter().next())
    }

    /// Sets a single field unconditionally.
    async fn update_field(
        &self,
        collection: &CollectionPath,
        id: &DocumentId,
        name: &str,
        value: serde_json::Value,
    ) -> Result<Document> {
        let mut fields = Fields::new();
        fields.insert(name.to_string(), value);
        self.update(collection, id, fields, WriteOptions::new())
            .await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
