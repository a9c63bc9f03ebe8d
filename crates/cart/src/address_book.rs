//! The user's saved shipping addresses.

use std::sync::Arc;

use common::UserId;
use document_store::{
    CollectionPath, Document, DocumentQuery, DocumentStore, DocumentStoreExt, WriteOptions,
};
use domain::codec::field;
use domain::{Address, DocumentCodec, select_default_address};
use serde_json::Value;

use crate::{CartError, Result};

/// Address book backed by `users/{user}/addresses`.
///
/// Addresses are keyed by address line plus postal code. Reads accept the
/// default flag in either stored form; writes always store a boolean, and
/// any document touched by a default change is rewritten in that form.
pub struct AddressBook<S: DocumentStore> {
    store: Arc<S>,
    user_id: UserId,
    collection: CollectionPath,
}

impl<S: DocumentStore> AddressBook<S> {
    pub fn for_user(store: Arc<S>, user_id: UserId) -> Self {
        Self {
            collection: CollectionPath::addresses(&user_id),
            store,
            user_id,
        }
    }

    /// All decodable addresses, in insertion order.
    pub async fn list(&self) -> Result<Vec<Address>> {
        let documents = self.store.list(&self.collection).await?;
        Ok(documents
            .iter()
            .filter_map(|d| self.decode(d).map(|(_, a)| a))
            .collect())
    }

    /// The address flagged default, if any. The first one wins when the
    /// store holds several.
    pub async fn default_address(&self) -> Result<Option<Address>> {
        let addresses = self.list().await?;
        let defaults = addresses.iter().filter(|a| a.is_default).count();
        if defaults > 1 {
            tracing::warn!(user_id = %self.user_id, defaults, "several default addresses stored");
        }
        Ok(select_default_address(&addresses).cloned())
    }

    /// Inserts or replaces the address at the same location.
    ///
    /// Saving an address flagged default clears the flag everywhere else.
    #[tracing::instrument(skip(self, address), fields(user_id = %self.user_id))]
    pub async fn save(&self, address: Address) -> Result<Address> {
        let existing = self.store.find_first(self.location_query(&address)).await?;

        match existing {
            Some(document) => {
                self.store
                    .update(
                        &self.collection,
                        &document.id,
                        address.to_fields(),
                        WriteOptions::new(),
                    )
                    .await?;
                tracing::debug!(document_id = %document.id, "address updated");
            }
            None => {
                let document = self.store.add(&self.collection, address.to_fields()).await?;
                tracing::debug!(document_id = %document.id, "address added");
            }
        }

        if address.is_default {
            self.set_default(&address).await?;
        }
        Ok(address)
    }

    /// Makes the address at this location the only default.
    #[tracing::instrument(skip(self, address), fields(user_id = %self.user_id))]
    pub async fn set_default(&self, address: &Address) -> Result<()> {
        let documents = self.store.list(&self.collection).await?;
        let target = documents
            .iter()
            .filter_map(|d| self.decode(d))
            .find(|(_, a)| a.same_location(address))
            .map(|(d, _)| d.id.clone())
            .ok_or_else(|| CartError::AddressNotFound {
                address_line: address.address_line.clone(),
                postal_code: address.postal_code.clone(),
            })?;

        for document in &documents {
            let should_be_default = document.id == target;
            // Rewrite legacy string flags too, not only wrong values.
            if document.field(field::IS_DEFAULT) != Some(&Value::Bool(should_be_default)) {
                self.store
                    .update_field(
                        &self.collection,
                        &document.id,
                        field::IS_DEFAULT,
                        Value::Bool(should_be_default),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Flags the only saved address as default when there is exactly one.
    ///
    /// Returns the promoted address, or `None` when nothing changed.
    pub async fn promote_sole_address(&self) -> Result<Option<Address>> {
        let documents = self.store.list(&self.collection).await?;
        let [document] = documents.as_slice() else {
            return Ok(None);
        };
        let Some((_, mut address)) = self.decode(document) else {
            return Ok(None);
        };
        if address.is_default {
            return Ok(None);
        }

        self.store
            .update_field(&self.collection, &document.id, field::IS_DEFAULT, Value::Bool(true))
            .await?;
        address.is_default = true;
        Ok(Some(address))
    }

    fn location_query(&self, address: &Address) -> DocumentQuery {
        DocumentQuery::collection(self.collection.clone())
            .where_eq(field::ADDRESS_LINE, address.address_line.as_str())
            .where_eq(field::POSTAL_CODE, address.postal_code.as_str())
    }

    fn decode<'a>(&self, document: &'a Document) -> Option<(&'a Document, Address)> {
        match Address::from_document(document) {
            Ok(address) => Some((document, address)),
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    document_id = %document.id,
                    error = %e,
                    "skipping undecodable address"
                );
                None
            }
        }
    }
}
