//! Conversion of Jira issues to source records.

use serde_json::Value;

use super::types::JiraIssue;
use crate::record::{ChangelogEntry, Comment, SourceRecord};

fn display_name(value: Option<&Value>) -> Option<String> {
    value?
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn to_comment(raw: &Value) -> Comment {
    Comment {
        author: display_name(raw.get("author")),
        body: text(raw.get("body")),
        updated: text(raw.get("updated").or_else(|| raw.get("created"))),
    }
}

/// Convert a Jira issue to a source record.
///
/// Comments move out of the field bag into [`SourceRecord::comments`]; the
/// changelog is flattened to one entry per changed field.
pub fn to_source_record(issue: JiraIssue) -> SourceRecord {
    let JiraIssue {
        key,
        mut fields,
        changelog,
    } = issue;

    let parent_key = fields
        .get("parent")
        .and_then(|p| p.get("key"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let comments = fields
        .remove("comment")
        .and_then(|c| c.get("comments").and_then(Value::as_array).cloned())
        .map(|list| list.iter().map(to_comment).collect())
        .unwrap_or_default();

    let changelog = changelog
        .map(|c| {
            c.histories
                .into_iter()
                .flat_map(|history| {
                    let timestamp = history.created;
                    history.items.into_iter().map(move |item| ChangelogEntry {
                        field: item.field,
                        from: item.from_value,
                        to: item.to_value,
                        timestamp: timestamp.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    SourceRecord {
        key,
        fields,
        parent_key,
        comments,
        changelog,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(json: Value) -> JiraIssue {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn converts_parent_comments_and_changelog() {
        let record = to_source_record(issue(json!({
            "key": "A-2",
            "fields": {
                "summary": "Child",
                "parent": { "key": "A-1", "fields": { "summary": "Parent" } },
                "comment": {
                    "comments": [
                        { "author": { "displayName": "Ada" }, "body": "first", "updated": "2024-01-01T09:00:00.000+0000" },
                        { "author": { "displayName": "Grace" }, "body": "second", "updated": "2024-01-02T09:00:00.000+0000" }
                    ]
                }
            },
            "changelog": {
                "histories": [
                    {
                        "created": "2024-01-02T10:00:00.000+0000",
                        "items": [
                            { "field": "status", "fromString": "To Do", "toString": "In Progress" },
                            { "field": "assignee", "fromString": null, "toString": "Ada" }
                        ]
                    }
                ]
            }
        })));

        assert_eq!(record.key, "A-2");
        assert_eq!(record.parent_key.as_deref(), Some("A-1"));
        assert!(!record.fields.contains_key("comment"));
        assert_eq!(record.fields.get("summary"), Some(&json!("Child")));

        assert_eq!(record.comments.len(), 2);
        assert_eq!(record.comments[1].author.as_deref(), Some("Grace"));
        assert_eq!(record.comments[1].body, "second");

        assert_eq!(record.changelog.len(), 2);
        assert_eq!(record.changelog[0].field, "status");
        assert_eq!(record.changelog[0].to.as_deref(), Some("In Progress"));
        assert_eq!(record.changelog[1].from, None);
        assert_eq!(
            record.changelog[1].timestamp,
            "2024-01-02T10:00:00.000+0000"
        );
    }

    #[test]
    fn issue_without_extras_converts_to_bare_record() {
        let record = to_source_record(issue(json!({ "key": "A-1", "fields": {} })));
        assert_eq!(record, SourceRecord::new("A-1"));
    }
}
