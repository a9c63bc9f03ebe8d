use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CollectionPath, DocumentId};

/// Loosely typed field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Revision of a document, used for optimistic concurrency control.
///
/// Revisions start at 1 when a document is inserted and increment by 1 on
/// every update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// Creates a revision from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the revision of a freshly inserted document.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next revision.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw revision value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A document as held by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier, unique within the collection.
    pub id: DocumentId,

    /// Collection the document belongs to.
    pub collection: CollectionPath,

    /// The document's fields.
    pub fields: Fields,

    /// Current revision.
    pub revision: Revision,

    /// When the document was inserted.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a new document at its first revision.
    pub fn new(collection: CollectionPath, id: DocumentId, fields: Fields) -> Self {
        let now = Utc::now();
        Self {
            id,
            collection,
            fields,
            revision: Revision::first(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns true if every `(field, value)` pair is present with an equal value.
    pub fn matches(&self, filters: &[(String, Value)]) -> bool {
        filters
            .iter()
            .all(|(name, expected)| self.fields.get(name) == Some(expected))
    }

    /// Merges `changes` into the fields and bumps the revision.
    pub fn apply_update(&mut self, changes: Fields) {
        for (name, value) in changes {
            self.fields.insert(name, value);
        }
        self.revision = self.revision.next();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn new_document_starts_at_first_revision() {
        let doc = Document::new(
            CollectionPath::orders(),
            DocumentId::new("d1"),
            fields(json!({"status": "pending"})),
        );
        assert_eq!(doc.revision, Revision::first());
        assert_eq!(doc.field("status"), Some(&json!("pending")));
    }

    #[test]
    fn apply_update_merges_and_bumps_revision() {
        let mut doc = Document::new(
            CollectionPath::orders(),
            DocumentId::new("d1"),
            fields(json!({"quantity": 1, "name": "Bag"})),
        );
        doc.apply_update(fields(json!({"quantity": 2})));

        assert_eq!(doc.revision, Revision::new(2));
        assert_eq!(doc.field("quantity"), Some(&json!(2)));
        assert_eq!(doc.field("name"), Some(&json!("Bag")));
    }

    #[test]
    fn matches_requires_all_filters() {
        let doc = Document::new(
            CollectionPath::orders(),
            DocumentId::new("d1"),
            fields(json!({"userId": "u1", "status": "pending"})),
        );
        assert!(doc.matches(&[("userId".into(), json!("u1"))]));
        assert!(!doc.matches(&[
            ("userId".into(), json!("u1")),
            ("status".into(), json!("delivered")),
        ]));
        assert!(!doc.matches(&[("missing".into(), json!(true))]));
    }
}
