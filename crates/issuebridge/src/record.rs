//! Records on both sides of the sync.
//!
//! [`SourceRecord`] is a read-only snapshot of one issue as fetched from the
//! tracker. [`StoreRecord`] is a row in the target table. Field bags are plain
//! JSON maps: the source keeps the tracker's raw field shapes, the target is
//! keyed by target field id.

use serde_json::Value;

/// A bag of named JSON field values.
pub type Fields = serde_json::Map<String, Value>;

/// One issue fetched from the tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    /// Identity key (e.g. `PROJ-123`). Unique and immutable.
    pub key: String,
    /// Raw field values keyed by source field id.
    pub fields: Fields,
    /// Identity key of the parent issue, if any.
    pub parent_key: Option<String>,
    /// Comments in store order (oldest first).
    pub comments: Vec<Comment>,
    /// Field transitions in store order.
    pub changelog: Vec<ChangelogEntry>,
}

impl SourceRecord {
    /// Create an empty record with the given identity key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set a raw field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Set the parent identity key.
    #[must_use]
    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    /// Append a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }

    /// Append a changelog entry.
    #[must_use]
    pub fn with_change(mut self, change: ChangelogEntry) -> Self {
        self.changelog.push(change);
        self
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Author display name.
    pub author: Option<String>,
    /// Comment text.
    pub body: String,
    /// Last-updated timestamp in the tracker's own format.
    pub updated: String,
}

/// A single field transition from the issue changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    /// Name of the field that changed (e.g. `status`).
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// When the transition happened, in the tracker's own format.
    pub timestamp: String,
}

/// A row in the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    /// Store-assigned record id. Opaque and stable.
    pub id: String,
    /// Field values keyed by target field id.
    pub fields: Fields,
}

impl StoreRecord {
    /// Get a field value as a string, if it is one.
    pub fn field_str(&self, field_id: &str) -> Option<&str> {
        self.fields.get(field_id).and_then(Value::as_str)
    }
}
