use common::UserId;
use serde::{Deserialize, Serialize};

/// Path of a document collection, e.g. `users/u1/cart`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Creates a collection path from a raw string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The cart collection of a user.
    pub fn cart(user_id: &UserId) -> Self {
        Self(format!("users/{user_id}/cart"))
    }

    /// The address collection of a user.
    pub fn addresses(user_id: &UserId) -> Self {
        Self(format!("users/{user_id}/addresses"))
    }

    /// The global order collection.
    pub fn orders() -> Self {
        Self("orders".to_string())
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
