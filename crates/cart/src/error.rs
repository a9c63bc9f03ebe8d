//! Cart error types.

use document_store::StoreError;
use domain::{DecodeError, DomainError};
use thiserror::Error;

/// Errors that can occur while working with carts and addresses.
#[derive(Debug, Error)]
pub enum CartError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// No saved address at this location.
    #[error("Address not found: {address_line} ({postal_code})")]
    AddressNotFound {
        address_line: String,
        postal_code: String,
    },
}

impl CartError {
    /// Returns true for optimistic concurrency failures worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CartError::Store(StoreError::ConcurrencyConflict { .. }))
    }
}

/// Result type for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;
