//! Cart side of the storefront.
//!
//! - [`CartAggregator`] keeps a live [`domain::CartSnapshot`] per user and
//!   applies add/quantity/remove mutations against the remote store
//! - [`AddressBook`] manages the user's saved addresses and the default flag

pub mod address_book;
pub mod aggregator;
pub mod error;

pub use address_book::AddressBook;
pub use aggregator::{CartAggregator, CartMutation, QuantityChange};
pub use error::{CartError, Result};
