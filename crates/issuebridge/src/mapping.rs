//! Source field to target field mapping.
//!
//! A mapping is a JSON (or TOML) object keyed by source field name. Each value
//! is either a bare target field id or a detailed entry:
//!
//! ```json
//! {
//!   "key": "fldKey",
//!   "summary": "fldSummary",
//!   "story_points": { "airtable_field_id": "fldPoints" },
//!   "age": { "airtable_field_id": "fldAge", "skip": true }
//! }
//! ```
//!
//! Skipped entries name computed/formula fields: they are validated and may be
//! read (e.g. for the watermark) but are never written.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigurationError;

/// Source field names with special handling during extraction.
pub mod logical {
    /// The issue's own identity key.
    pub const KEY: &str = "key";
    /// The parent issue (written in the linking pass).
    pub const PARENT: &str = "parent";
    /// Last-updated timestamp, also the watermark field.
    pub const UPDATED: &str = "updated";
    /// Body of the most recent comment.
    pub const LATEST_COMMENT: &str = "latest_comment";
    /// Author of the most recent comment.
    pub const COMMENT_AUTHOR: &str = "comment_author";
    /// Update time of the most recent comment.
    pub const COMMENT_UPDATED: &str = "comment_updated";
    /// Time of the most recent status transition.
    pub const STATUS_UPDATED: &str = "status_updated";
}

/// Where one source field lands in the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub target_field_id: String,
    /// Computed target field: never written.
    pub skip: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Id(String),
    Detailed {
        #[serde(alias = "target_field_id")]
        airtable_field_id: String,
        #[serde(default)]
        skip: bool,
    },
}

impl From<RawEntry> for MappingEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Id(target_field_id) => Self {
                target_field_id,
                skip: false,
            },
            RawEntry::Detailed {
                airtable_field_id,
                skip,
            } => Self {
                target_field_id: airtable_field_id,
                skip,
            },
        }
    }
}

/// Static table translating source field names to target field ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, RawEntry>")]
pub struct FieldMapping {
    entries: BTreeMap<String, MappingEntry>,
}

impl From<BTreeMap<String, RawEntry>> for FieldMapping {
    fn from(raw: BTreeMap<String, RawEntry>) -> Self {
        Self {
            entries: raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mapping from a JSON object string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidFieldMap(e.to_string()))
    }

    /// Add a written mapping.
    #[must_use]
    pub fn with(mut self, source: impl Into<String>, target_field_id: impl Into<String>) -> Self {
        self.entries.insert(
            source.into(),
            MappingEntry {
                target_field_id: target_field_id.into(),
                skip: false,
            },
        );
        self
    }

    /// Add a computed (never written) mapping.
    #[must_use]
    pub fn with_skipped(
        mut self,
        source: impl Into<String>,
        target_field_id: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            source.into(),
            MappingEntry {
                target_field_id: target_field_id.into(),
                skip: true,
            },
        );
        self
    }

    pub fn get(&self, source: &str) -> Option<&MappingEntry> {
        self.entries.get(source)
    }

    /// Target field id for a source field, skipped or not.
    pub fn target_id(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(|e| e.target_field_id.as_str())
    }

    /// Target field carrying the identity key.
    pub fn key_field(&self) -> Option<&str> {
        self.target_id(logical::KEY)
    }

    /// Target field the linking pass writes parents into.
    ///
    /// `None` when the parent is unmapped or skipped, which disables linking.
    pub fn parent_field(&self) -> Option<&str> {
        self.entries
            .get(logical::PARENT)
            .filter(|entry| !entry.skip)
            .map(|entry| entry.target_field_id.as_str())
    }

    /// Target field holding the last-updated timestamp.
    pub fn updated_field(&self) -> Option<&str> {
        self.target_id(logical::UPDATED)
    }

    /// All entries, in source-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries that are written to the target.
    pub fn writable(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.iter().filter(|(_, e)| !e.skip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_detailed_entries() {
        let mapping = FieldMapping::from_json_str(
            r#"{
                "key": "fldKey",
                "story_points": { "airtable_field_id": "fldPoints" },
                "age": { "airtable_field_id": "fldAge", "skip": true }
            }"#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.key_field(), Some("fldKey"));
        assert_eq!(mapping.target_id("story_points"), Some("fldPoints"));
        assert!(mapping.get("age").unwrap().skip);
        assert!(!mapping.get("story_points").unwrap().skip);
    }

    #[test]
    fn accepts_target_field_id_alias() {
        let mapping =
            FieldMapping::from_json_str(r#"{"summary": {"target_field_id": "fldSummary"}}"#)
                .unwrap();
        assert_eq!(mapping.target_id("summary"), Some("fldSummary"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = FieldMapping::from_json_str(r#"{"key": 42}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFieldMap(_)));

        let err = FieldMapping::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFieldMap(_)));
    }

    #[test]
    fn writable_excludes_skipped_entries() {
        let mapping = FieldMapping::new()
            .with("key", "fldKey")
            .with("summary", "fldSummary")
            .with_skipped("updated", "fldUpdated");

        let writable: Vec<&str> = mapping.writable().map(|(name, _)| name).collect();
        assert_eq!(writable, vec!["key", "summary"]);
        assert_eq!(mapping.updated_field(), Some("fldUpdated"));
    }

    #[test]
    fn special_field_accessors() {
        let mapping = FieldMapping::new().with("key", "fldKey").with("parent", "fldParent");
        assert_eq!(mapping.key_field(), Some("fldKey"));
        assert_eq!(mapping.parent_field(), Some("fldParent"));
        assert_eq!(mapping.updated_field(), None);
    }

    #[test]
    fn skipped_parent_disables_linking() {
        let mapping = FieldMapping::new().with("key", "fldKey");
        assert_eq!(mapping.parent_field(), None);

        let mapping = FieldMapping::new().with_skipped("parent", "fldParent");
        assert_eq!(mapping.parent_field(), None);
        assert_eq!(mapping.target_id("parent"), Some("fldParent"));
    }
}
