pub mod types;

pub use types::{DocumentId, UserId};
