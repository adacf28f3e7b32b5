//! Building target payloads from source records.

use crate::mapping::{FieldMapping, logical};
use crate::record::{Fields, SourceRecord};

use super::extract::{ExtractError, extract_field};

/// A source record reduced to what the writer and linker need.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedIssue {
    pub key: String,
    /// Payload keyed by target field id. Never contains the parent link.
    pub fields: Fields,
    pub parent_key: Option<String>,
    /// Fields that could not be derived and were left out.
    pub errors: Vec<ExtractError>,
}

/// Build the target payload for one record.
///
/// Every written mapping entry is extracted; fields without a value are
/// omitted, and so is the parent link, which is written by the linking pass
/// once both records exist.
pub fn transform_issue(
    record: &SourceRecord,
    mapping: &FieldMapping,
    date_fields: &[String],
) -> TransformedIssue {
    let mut fields = Fields::new();
    let mut errors = Vec::new();

    for (source, entry) in mapping.writable() {
        if source == logical::PARENT {
            continue;
        }
        match extract_field(record, source, date_fields) {
            Ok(Some(value)) => {
                fields.insert(entry.target_field_id.clone(), value);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %record.key, field = source, "Omitting field: {}", e.message);
                errors.push(e);
            }
        }
    }

    TransformedIssue {
        key: record.key.clone(),
        fields,
        parent_key: record.parent_key.clone(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> FieldMapping {
        FieldMapping::new()
            .with("key", "fldKey")
            .with("summary", "fldSummary")
            .with("priority", "fldPriority")
            .with("parent", "fldParent")
            .with("updated", "fldUpdated")
            .with_skipped("age", "fldAge")
    }

    #[test]
    fn builds_payload_without_parent_or_skipped_fields() {
        let record = SourceRecord::new("A-2")
            .with_parent("A-1")
            .with_field("summary", json!("Child"))
            .with_field("priority", json!({ "name": "High" }))
            .with_field("age", json!(12));

        let issue = transform_issue(&record, &mapping(), &[]);

        assert_eq!(issue.key, "A-2");
        assert_eq!(issue.parent_key.as_deref(), Some("A-1"));
        assert_eq!(issue.fields.get("fldKey"), Some(&json!("A-2")));
        assert_eq!(issue.fields.get("fldSummary"), Some(&json!("Child")));
        assert_eq!(issue.fields.get("fldPriority"), Some(&json!("High")));
        assert!(!issue.fields.contains_key("fldParent"));
        assert!(!issue.fields.contains_key("fldAge"));
        // No value for `updated`: omitted rather than written as null.
        assert!(!issue.fields.contains_key("fldUpdated"));
        assert!(issue.errors.is_empty());
    }

    #[test]
    fn extraction_errors_omit_only_that_field() {
        let record = SourceRecord::new("A-1")
            .with_field("summary", json!("Still here"))
            .with_field("updated", json!("not a date"));

        let issue = transform_issue(&record, &mapping(), &["updated".to_string()]);

        assert_eq!(issue.fields.get("fldSummary"), Some(&json!("Still here")));
        assert!(!issue.fields.contains_key("fldUpdated"));
        assert_eq!(issue.errors.len(), 1);
        assert_eq!(issue.errors[0].field, "updated");
    }
}
