use thiserror::Error;

use crate::{CollectionPath, DocumentId, Revision};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        collection: CollectionPath,
        id: DocumentId,
    },

    /// The document changed since it was read.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected revision {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: CollectionPath,
        id: DocumentId,
        expected: Revision,
        actual: Revision,
    },

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for transport-level failures that a later retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }

    /// Returns true if the addressed document was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
