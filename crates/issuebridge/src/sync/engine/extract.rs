//! Field value extraction from source records.
//!
//! Raw tracker values come in a handful of shapes: plain scalars, option
//! objects exposing `value`, named entities exposing `name`, users exposing
//! `displayName`, and lists of any of these. [`FieldShape::classify`] tags a
//! value with the first matching shape, in this fixed order:
//!
//! 1. `Scalar` - string, number or bool, returned as-is
//! 2. `HasValue` - object with `value`
//! 3. `HasName` - object with `name`
//! 4. `List` - each element reduced by the `value`/`name` rule, else kept as-is
//! 5. `HasDisplayName` - object with `displayName`
//! 6. `Other` - anything else, stringified
//!
//! A few logical field names bypass the raw lookup entirely; see
//! [`logical`](crate::mapping::logical).

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde_json::Value;
use thiserror::Error;

use crate::mapping::logical;
use crate::record::SourceRecord;

/// Field name in the changelog that records status transitions.
const STATUS_FIELD: &str = "status";

/// A raw value tagged with the shape that decides how it is reduced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldShape<'a> {
    Scalar(&'a Value),
    HasValue(&'a Value),
    HasName(&'a Value),
    List(&'a [Value]),
    HasDisplayName(&'a Value),
    Other(&'a Value),
}

impl<'a> FieldShape<'a> {
    /// Tag a raw value. `None` for JSON null (treated as absent).
    pub fn classify(raw: &'a Value) -> Option<Self> {
        match raw {
            Value::Null => None,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(Self::Scalar(raw)),
            Value::Object(map) => Some(if let Some(v) = map.get("value") {
                Self::HasValue(v)
            } else if let Some(v) = map.get("name") {
                Self::HasName(v)
            } else if let Some(v) = map.get("displayName") {
                Self::HasDisplayName(v)
            } else {
                Self::Other(raw)
            }),
            Value::Array(items) => Some(Self::List(items)),
        }
    }

    /// Reduce to the value written to the target.
    pub fn reduce(self) -> Option<Value> {
        match self {
            Self::Scalar(v) | Self::HasValue(v) | Self::HasName(v) | Self::HasDisplayName(v) => {
                non_null(v)
            }
            Self::List(items) => Some(Value::Array(
                items.iter().filter_map(reduce_element).collect(),
            )),
            Self::Other(v) => Some(Value::String(v.to_string())),
        }
    }
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

/// List elements only consult `value` and `name`; anything else is kept whole.
fn reduce_element(item: &Value) -> Option<Value> {
    match item {
        Value::Null => None,
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("name"))
            .map_or_else(|| Some(item.clone()), non_null),
        other => Some(other.clone()),
    }
}

/// A field value could not be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}': {message}")]
pub struct ExtractError {
    pub field: String,
    pub message: String,
}

/// Parse a tracker timestamp (`2024-01-02T10:00:00.000+0000` and friends).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let owned;
    let input = if let Some(stripped) = raw.strip_suffix('Z') {
        owned = format!("{stripped}+00:00");
        owned.as_str()
    } else {
        raw
    };

    DateTime::parse_from_rfc3339(input)
        .or_else(|_| DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M%z"))
        .ok()
}

/// Normalize a timestamp to RFC 3339, keeping its offset.
///
/// Date-only values pass through unchanged.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    if let Some(dt) = parse_timestamp(raw) {
        return Some(dt.to_rfc3339_opts(SecondsFormat::Millis, false));
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn normalized(field: &str, raw: &str) -> Result<Value, ExtractError> {
    normalize_timestamp(raw)
        .map(Value::String)
        .ok_or_else(|| ExtractError {
            field: field.to_string(),
            message: format!("unrecognized timestamp '{raw}'"),
        })
}

fn latest_status_change(record: &SourceRecord) -> Result<Option<Value>, ExtractError> {
    let mut latest: Option<(DateTime<FixedOffset>, &str)> = None;
    for entry in record.changelog.iter().filter(|e| e.field == STATUS_FIELD) {
        let parsed = parse_timestamp(&entry.timestamp).ok_or_else(|| ExtractError {
            field: logical::STATUS_UPDATED.to_string(),
            message: format!("unrecognized changelog timestamp '{}'", entry.timestamp),
        })?;
        if latest.is_none_or(|(best, _)| parsed > best) {
            latest = Some((parsed, &entry.timestamp));
        }
    }

    latest
        .map(|(_, raw)| normalized(logical::STATUS_UPDATED, raw))
        .transpose()
}

/// Derive the value of one logical field from a source record.
///
/// `date_fields` names raw fields whose string values are timestamps to
/// normalize. `Ok(None)` means the field has no value and is omitted.
pub fn extract_field(
    record: &SourceRecord,
    name: &str,
    date_fields: &[String],
) -> Result<Option<Value>, ExtractError> {
    match name {
        logical::KEY => return Ok(Some(Value::String(record.key.clone()))),
        logical::PARENT => return Ok(record.parent_key.clone().map(Value::String)),
        logical::LATEST_COMMENT => {
            return Ok(record
                .comments
                .last()
                .map(|c| Value::String(c.body.clone())));
        }
        logical::COMMENT_AUTHOR => {
            return Ok(record
                .comments
                .last()
                .and_then(|c| c.author.clone())
                .map(Value::String));
        }
        logical::COMMENT_UPDATED => {
            return record
                .comments
                .last()
                .map(|c| normalized(name, &c.updated))
                .transpose();
        }
        logical::STATUS_UPDATED => return latest_status_change(record),
        _ => {}
    }

    let Some(raw) = record.fields.get(name) else {
        return Ok(None);
    };
    let Some(value) = FieldShape::classify(raw).and_then(FieldShape::reduce) else {
        return Ok(None);
    };

    if date_fields.iter().any(|f| f == name)
        && let Value::String(ref s) = value
    {
        return normalized(name, s).map(Some);
    }

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChangelogEntry, Comment};
    use serde_json::json;

    fn dates() -> Vec<String> {
        vec!["created".to_string(), "updated".to_string()]
    }

    fn extract(record: &SourceRecord, name: &str) -> Option<Value> {
        extract_field(record, name, &dates()).unwrap()
    }

    #[test]
    fn classify_follows_fixed_precedence() {
        let both = json!({ "value": "High", "name": "P1" });
        assert_eq!(
            FieldShape::classify(&both),
            Some(FieldShape::HasValue(&json!("High")))
        );

        let named = json!({ "name": "Bug", "displayName": "ignored" });
        assert!(matches!(
            FieldShape::classify(&named),
            Some(FieldShape::HasName(_))
        ));

        let user = json!({ "displayName": "Ada", "accountId": "x" });
        assert!(matches!(
            FieldShape::classify(&user),
            Some(FieldShape::HasDisplayName(_))
        ));

        assert!(matches!(
            FieldShape::classify(&json!(3)),
            Some(FieldShape::Scalar(_))
        ));
        assert!(matches!(
            FieldShape::classify(&json!([1])),
            Some(FieldShape::List(_))
        ));
        assert!(matches!(
            FieldShape::classify(&json!({ "id": 1 })),
            Some(FieldShape::Other(_))
        ));
        assert_eq!(FieldShape::classify(&Value::Null), None);
    }

    #[test]
    fn value_wins_over_name() {
        let record =
            SourceRecord::new("A-1").with_field("priority", json!({ "value": "V", "name": "N" }));
        assert_eq!(extract(&record, "priority"), Some(json!("V")));
    }

    #[test]
    fn reduces_each_shape() {
        let record = SourceRecord::new("A-1")
            .with_field("summary", json!("Fix it"))
            .with_field("story_points", json!(5))
            .with_field("issuetype", json!({ "name": "Bug" }))
            .with_field("assignee", json!({ "displayName": "Ada", "accountId": "1" }))
            .with_field(
                "components",
                json!([{ "name": "api" }, { "value": "web", "name": "x" }, "raw", { "id": 7 }]),
            )
            .with_field("watches", json!({ "watchCount": 2 }))
            .with_field("labels", json!([]))
            .with_field("duedate", Value::Null);

        assert_eq!(extract(&record, "summary"), Some(json!("Fix it")));
        assert_eq!(extract(&record, "story_points"), Some(json!(5)));
        assert_eq!(extract(&record, "issuetype"), Some(json!("Bug")));
        assert_eq!(extract(&record, "assignee"), Some(json!("Ada")));
        assert_eq!(
            extract(&record, "components"),
            Some(json!(["api", "web", "raw", { "id": 7 }]))
        );
        assert_eq!(
            extract(&record, "watches"),
            Some(json!("{\"watchCount\":2}"))
        );
        assert_eq!(extract(&record, "labels"), Some(json!([])));
        assert_eq!(extract(&record, "duedate"), None);
        assert_eq!(extract(&record, "missing"), None);
    }

    #[test]
    fn key_and_parent_come_from_the_record() {
        let record = SourceRecord::new("A-2")
            .with_parent("A-1")
            .with_field("key", json!("shadowed"));
        assert_eq!(extract(&record, "key"), Some(json!("A-2")));
        assert_eq!(extract(&record, "parent"), Some(json!("A-1")));
        assert_eq!(extract(&SourceRecord::new("A-1"), "parent"), None);
    }

    #[test]
    fn latest_comment_family_uses_last_comment() {
        let record = SourceRecord::new("A-1")
            .with_comment(Comment {
                author: Some("Ada".to_string()),
                body: "first".to_string(),
                updated: "2024-01-01T09:00:00.000+0000".to_string(),
            })
            .with_comment(Comment {
                author: None,
                body: "second".to_string(),
                updated: "2024-01-02T09:30:00.000+0100".to_string(),
            });

        assert_eq!(extract(&record, "latest_comment"), Some(json!("second")));
        assert_eq!(extract(&record, "comment_author"), None);
        assert_eq!(
            extract(&record, "comment_updated"),
            Some(json!("2024-01-02T09:30:00.000+01:00"))
        );

        let bare = SourceRecord::new("A-2");
        assert_eq!(extract(&bare, "latest_comment"), None);
        assert_eq!(extract(&bare, "comment_updated"), None);
    }

    #[test]
    fn status_updated_picks_latest_status_transition() {
        let change = |field: &str, ts: &str| ChangelogEntry {
            field: field.to_string(),
            from: None,
            to: None,
            timestamp: ts.to_string(),
        };
        let record = SourceRecord::new("A-1")
            .with_change(change("status", "2024-01-03T10:00:00.000+0000"))
            .with_change(change("assignee", "2024-02-01T10:00:00.000+0000"))
            .with_change(change("status", "2024-01-05T08:00:00.000+0000"))
            .with_change(change("status", "2024-01-04T10:00:00.000+0000"));

        assert_eq!(
            extract(&record, "status_updated"),
            Some(json!("2024-01-05T08:00:00.000+00:00"))
        );
        assert_eq!(extract(&SourceRecord::new("A-2"), "status_updated"), None);
    }

    #[test]
    fn date_fields_are_normalized() {
        let record = SourceRecord::new("A-1")
            .with_field("updated", json!("2024-01-02T10:00:00.000+0000"))
            .with_field("created", json!("2024-01-01T00:00Z"));

        assert_eq!(
            extract(&record, "updated"),
            Some(json!("2024-01-02T10:00:00.000+00:00"))
        );
        assert_eq!(
            extract(&record, "created"),
            Some(json!("2024-01-01T00:00:00.000+00:00"))
        );
    }

    #[test]
    fn bad_date_is_an_extraction_error() {
        let record = SourceRecord::new("A-1").with_field("updated", json!("yesterday"));
        let err = extract_field(&record, "updated", &dates()).unwrap_err();
        assert_eq!(err.field, "updated");
        assert!(err.message.contains("yesterday"));
        assert!(err.to_string().starts_with("field 'updated': "));
    }

    #[test]
    fn normalize_timestamp_variants() {
        assert_eq!(
            normalize_timestamp("2024-01-02T10:00:00.000+0000").as_deref(),
            Some("2024-01-02T10:00:00.000+00:00")
        );
        assert_eq!(
            normalize_timestamp("2024-01-02T10:00:00Z").as_deref(),
            Some("2024-01-02T10:00:00.000+00:00")
        );
        assert_eq!(
            normalize_timestamp("2024-01-02").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(normalize_timestamp("soon"), None);
    }
}
