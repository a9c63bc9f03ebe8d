//! Live cart snapshot and cart mutations for one user.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use common::UserId;
use document_store::{
    CollectionPath, Document, DocumentQuery, DocumentStore, DocumentStoreExt, Fields,
    StoreError, WriteOptions,
};
use domain::codec::field;
use domain::{CartLine, CartSnapshot, DocumentCodec, ProductId};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Result;

/// Attempts per mutation before a revision conflict is reported as a failure.
const MAX_ATTEMPTS: u32 = 3;

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Increment,
    Decrement,
}

impl QuantityChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityChange::Increment => "increment",
            QuantityChange::Decrement => "decrement",
        }
    }
}

/// What a cart mutation did to the remote cart.
///
/// Mutations never return an error: failures are logged and reported here,
/// and the snapshot catches up on the next subscription tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    /// A new line was written.
    Inserted,

    /// An existing line now has `quantity` units.
    QuantityChanged { quantity: u32 },

    /// The line was deleted.
    Removed,

    /// No line for the product exists; nothing changed.
    Missing,

    /// The remote store rejected the write.
    Failed { reason: String },
}

impl CartMutation {
    pub fn is_failure(&self) -> bool {
        matches!(self, CartMutation::Failed { .. })
    }
}

/// Keeps a user's [`CartSnapshot`] in sync with the remote cart collection.
///
/// Every notification from the store replaces the whole snapshot; totals are
/// never patched in place. Mutations write to the store only and the
/// snapshot reflects them once the subscription delivers the change.
///
/// Mutations read the current line and write it back guarded by its
/// revision, retrying on conflict, so two quick changes to the same product
/// do not overwrite each other.
pub struct CartAggregator<S: DocumentStore + 'static> {
    store: Arc<S>,
    user_id: UserId,
    collection: CollectionPath,
    snapshot: Arc<watch::Sender<CartSnapshot>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl<S: DocumentStore + 'static> CartAggregator<S> {
    /// Creates an aggregator for a user's cart. Call [`subscribe`] to start
    /// receiving snapshots.
    ///
    /// [`subscribe`]: CartAggregator::subscribe
    pub fn for_user(store: Arc<S>, user_id: UserId) -> Self {
        let (sender, _) = watch::channel(CartSnapshot::empty());
        Self {
            collection: CollectionPath::cart(&user_id),
            store,
            user_id,
            snapshot: Arc::new(sender),
            subscription: Mutex::new(None),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Opens the live subscription, replacing any previous one.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn subscribe(&self) -> Result<()> {
        let mut stream = self.store.subscribe(&self.collection).await?;
        let sender = Arc::clone(&self.snapshot);
        let user_id = self.user_id.clone();

        let task = tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                match next {
                    Ok(documents) => {
                        let snapshot = snapshot_from_documents(&user_id, &documents);
                        metrics::counter!("cart_snapshots_published").increment(1);
                        sender.send_replace(snapshot);
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, error = %e, "cart subscription error");
                    }
                }
            }
            tracing::debug!(user_id = %user_id, "cart subscription closed");
        });

        if let Some(previous) = self.lock_subscription().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Stops the live subscription. The last snapshot stays readable.
    pub fn unsubscribe(&self) {
        if let Some(task) = self.lock_subscription().take() {
            task.abort();
        }
    }

    /// Returns the latest snapshot.
    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver notified on every new snapshot.
    pub fn watch(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.subscribe()
    }

    /// Adds a product. An existing line for the product gains one unit and
    /// `line.quantity` is ignored; otherwise `line` is inserted as given.
    #[tracing::instrument(skip(self, line), fields(user_id = %self.user_id, product_id = %line.product_id))]
    pub async fn add_item(&self, line: CartLine) -> CartMutation {
        let line = &line;
        self.run_mutation("add", &line.product_id, move || self.try_add(line))
            .await
    }

    /// Increments, or decrements down to removal at one unit.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id, change = change.as_str()))]
    pub async fn change_quantity(
        &self,
        product_id: &ProductId,
        change: QuantityChange,
    ) -> CartMutation {
        self.run_mutation(change.as_str(), product_id, move || {
            self.try_change_quantity(product_id, change)
        })
        .await
    }

    /// Deletes every line for the product.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> CartMutation {
        self.run_mutation("remove", product_id, move || self.try_remove(product_id))
            .await
    }

    async fn run_mutation<F, Fut>(
        &self,
        op: &'static str,
        product_id: &ProductId,
        mut attempt: F,
    ) -> CartMutation
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CartMutation>>,
    {
        metrics::counter!("cart_mutations_total", "op" => op).increment(1);

        for n in 1..=MAX_ATTEMPTS {
            match attempt().await {
                Ok(CartMutation::Missing) => {
                    tracing::warn!(product_id = %product_id, op, "no cart line for product");
                    return CartMutation::Missing;
                }
                Ok(outcome) => return outcome,
                Err(e) if e.is_conflict() && n < MAX_ATTEMPTS => {
                    tracing::debug!(product_id = %product_id, op, attempt = n, "cart line changed, retrying");
                }
                Err(crate::CartError::Store(e)) if e.is_not_found() => {
                    tracing::warn!(product_id = %product_id, op, "cart line vanished during update");
                    return CartMutation::Missing;
                }
                Err(e) => {
                    tracing::warn!(product_id = %product_id, op, error = %e, "cart mutation failed");
                    metrics::counter!("cart_mutations_failed", "op" => op).increment(1);
                    return CartMutation::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        CartMutation::Failed {
            reason: format!("gave up after {MAX_ATTEMPTS} attempts"),
        }
    }

    async fn try_add(&self, line: &CartLine) -> Result<CartMutation> {
        match self.find_line(&line.product_id).await? {
            Some((document, current)) => {
                let quantity = current.quantity.saturating_add(1);
                self.write_quantity(&document, quantity).await?;
                Ok(CartMutation::QuantityChanged { quantity })
            }
            None => {
                self.store.add(&self.collection, line.to_fields()).await?;
                Ok(CartMutation::Inserted)
            }
        }
    }

    async fn try_change_quantity(
        &self,
        product_id: &ProductId,
        change: QuantityChange,
    ) -> Result<CartMutation> {
        let Some((document, current)) = self.find_line(product_id).await? else {
            return Ok(CartMutation::Missing);
        };

        match change {
            QuantityChange::Increment => {
                let quantity = current.quantity.saturating_add(1);
                self.write_quantity(&document, quantity).await?;
                Ok(CartMutation::QuantityChanged { quantity })
            }
            QuantityChange::Decrement if current.quantity > 1 => {
                let quantity = current.quantity - 1;
                self.write_quantity(&document, quantity).await?;
                Ok(CartMutation::QuantityChanged { quantity })
            }
            QuantityChange::Decrement => {
                self.store
                    .delete(
                        &self.collection,
                        &document.id,
                        WriteOptions::expect_revision(document.revision),
                    )
                    .await?;
                Ok(CartMutation::Removed)
            }
        }
    }

    async fn try_remove(&self, product_id: &ProductId) -> Result<CartMutation> {
        let documents = self.store.query(self.line_query(product_id)).await?;
        if documents.is_empty() {
            return Ok(CartMutation::Missing);
        }

        for document in documents {
            match self
                .store
                .delete(&self.collection, &document.id, WriteOptions::new())
                .await
            {
                Ok(()) => {}
                // Already gone; the outcome is the same.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(CartMutation::Removed)
    }

    async fn find_line(&self, product_id: &ProductId) -> Result<Option<(Document, CartLine)>> {
        let Some(document) = self.store.find_first(self.line_query(product_id)).await? else {
            return Ok(None);
        };
        let line = CartLine::from_document(&document)?;
        Ok(Some((document, line)))
    }

    async fn write_quantity(&self, document: &Document, quantity: u32) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert(field::QUANTITY.to_string(), quantity.into());
        self.store
            .update(
                &self.collection,
                &document.id,
                fields,
                WriteOptions::expect_revision(document.revision),
            )
            .await?;
        Ok(())
    }

    fn line_query(&self, product_id: &ProductId) -> DocumentQuery {
        DocumentQuery::collection(self.collection.clone())
            .where_eq(field::PRODUCT_ID, product_id.as_str())
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: DocumentStore + 'static> Drop for CartAggregator<S> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Decodes a full cart collection. Undecodable documents are skipped.
fn snapshot_from_documents(user_id: &UserId, documents: &[Document]) -> CartSnapshot {
    let lines = documents
        .iter()
        .filter_map(|document| match CartLine::from_document(document) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    document_id = %document.id,
                    error = %e,
                    "skipping undecodable cart line"
                );
                None
            }
        })
        .collect();
    CartSnapshot::from_lines(lines)
}
