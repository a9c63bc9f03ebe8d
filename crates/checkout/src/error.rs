//! Checkout error types.

use cart::CartError;
use document_store::StoreError;
use domain::{DecodeError, DomainError};
use thiserror::Error;

/// Failures obtaining a payment session from the backend.
///
/// The display strings are the messages shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The backend answered with a non-success status.
    #[error("Server Error: {body}")]
    Server { status: u16, body: String },

    /// The backend could not be reached.
    #[error("Network Error: {0}")]
    Network(String),

    #[error("Unexpected Error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() {
            PaymentError::Unexpected(e.to_string())
        } else {
            PaymentError::Network(e.to_string())
        }
    }
}

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// There is nothing to check out.
    #[error("Cart is empty")]
    EmptyCart,

    /// Another checkout for this session has not finished.
    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    /// A payment attempt is still live on this coordinator.
    #[error("A payment attempt is already in progress")]
    PaymentInProgress,

    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
