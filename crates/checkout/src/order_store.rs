//! Order persistence and order history.

use std::sync::Arc;

use common::{DocumentId, UserId};
use document_store::{CollectionPath, DocumentQuery, DocumentStore};
use domain::codec::field;
use domain::{DocumentCodec, OrderRecord, OrderStatus};
use serde::Serialize;

use crate::Result;

/// An order together with its store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOrder {
    pub id: DocumentId,

    #[serde(flatten)]
    pub order: OrderRecord,
}

/// Order records in the shared `orders` collection.
///
/// Append-only from this side: status changes happen elsewhere.
pub struct OrderRepository<S: DocumentStore> {
    store: Arc<S>,
    collection: CollectionPath,
}

impl<S: DocumentStore> OrderRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            collection: CollectionPath::orders(),
        }
    }

    /// Writes one order record.
    #[tracing::instrument(skip(self, order), fields(user_id = %order.user_id, product_id = %order.product_id))]
    pub async fn persist(&self, order: &OrderRecord) -> Result<StoredOrder> {
        let document = self.store.add(&self.collection, order.to_fields()).await?;
        tracing::debug!(order_id = %document.id, "order persisted");
        Ok(StoredOrder {
            id: document.id,
            order: order.clone(),
        })
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Option<StoredOrder>> {
        let Some(document) = self.store.get(&self.collection, id).await? else {
            return Ok(None);
        };
        let order = OrderRecord::from_document(&document)?;
        Ok(Some(StoredOrder {
            id: document.id,
            order,
        }))
    }

    /// A user's orders in placement order, optionally only those in `status`.
    ///
    /// Undecodable documents are skipped.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<StoredOrder>> {
        let mut query = DocumentQuery::collection(self.collection.clone())
            .where_eq(field::USER_ID, user_id.as_str());
        if let Some(status) = status {
            query = query.where_eq(field::STATUS, status.as_str());
        }

        let documents = self.store.query(query).await?;
        Ok(documents
            .into_iter()
            .filter_map(|document| match OrderRecord::from_document(&document) {
                Ok(order) => Some(StoredOrder {
                    id: document.id,
                    order,
                }),
                Err(e) => {
                    tracing::warn!(order_id = %document.id, error = %e, "skipping undecodable order");
                    None
                }
            })
            .collect())
    }
}
