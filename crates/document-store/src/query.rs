use serde_json::Value;

use crate::CollectionPath;

/// Builder for equality queries over one collection.
///
/// Filters compare top-level fields for exact JSON equality; results come
/// back in insertion order.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: CollectionPath,

    /// Field equality filters, all of which must hold.
    pub filters: Vec<(String, Value)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query returning every document of a collection.
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Requires `field` to equal `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Limits the number of documents returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds the JSON object used for containment matching (`fields @> filter`).
    pub fn filter_object(&self) -> Value {
        let map: serde_json::Map<String, Value> = self.filters.iter().cloned().collect();
        Value::Object(map)
    }
}
