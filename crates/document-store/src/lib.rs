//! Document-oriented remote store used for carts, addresses and orders.
//!
//! Documents live in collections addressed by path (`users/{uid}/cart`,
//! `users/{uid}/addresses`, `orders`). Every document carries a revision for
//! optimistic concurrency, and collections can be watched through a live
//! subscription that always delivers the whole collection.

pub mod document;
pub mod error;
pub mod memory;
pub mod path;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{DocumentId, UserId};
pub use document::{Document, Fields, Revision};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use path::CollectionPath;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt, SnapshotStream, WriteOptions};
