//! Domain error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::codec::DecodeError;

/// Errors that can occur while building domain values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Prices cannot be negative.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: Decimal },

    /// Unknown order status string.
    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    /// A stored document could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}
