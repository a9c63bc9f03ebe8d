//! Domain layer for the storefront checkout system.
//!
//! This crate provides the pure pieces of cart/checkout reconciliation:
//! - Money and product identifiers
//! - Cart lines and the derived cart snapshot
//! - Addresses and default-address selection
//! - Order records and the order composer that prices them
//! - Codecs translating each entity to and from store documents

pub mod address;
pub mod cart;
pub mod codec;
pub mod error;
pub mod order;
pub mod value_objects;

pub use address::{Address, select_default_address};
pub use cart::{CartLine, CartSnapshot};
pub use codec::{DecodeError, DocumentCodec};
pub use error::DomainError;
pub use order::{
    Charges, DEFAULT_DELIVERY_CHARGE, DEFAULT_EXCHANGE_FACTOR, DEFAULT_OTHER_CHARGES, OrderComposer,
    OrderRecord, OrderStatus, Product, amount_due,
};
pub use value_objects::{Money, ProductId};
