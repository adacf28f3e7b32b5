//! Jira API data types.
//!
//! Only the parts of each response the sync reads are modelled; issue fields
//! stay as raw JSON because their shapes vary per field and per instance.

use serde::Deserialize;
use serde_json::{Map, Value};

/// The authenticated user (`GET /rest/api/2/myself`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// IANA timezone name, e.g. `Europe/Berlin`.
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// One page of `GET /rest/api/2/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub start_at: usize,
    #[serde(default)]
    pub max_results: usize,
    pub total: usize,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

/// An issue as returned by search with `expand=changelog`.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub changelog: Option<Changelog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<History>,
}

/// One changelog entry: a set of field changes made at the same time.
#[derive(Debug, Clone, Deserialize)]
pub struct History {
    pub created: String,
    #[serde(default)]
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryItem {
    pub field: String,
    #[serde(rename = "fromString", default)]
    pub from_value: Option<String>,
    #[serde(rename = "toString", default)]
    pub to_value: Option<String>,
}

/// Error body returned by Jira on 4xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: Map<String, Value>,
}

impl ErrorBody {
    /// Flatten every message into one line.
    pub(crate) fn summary(&self) -> Option<String> {
        let mut parts = self.error_messages.clone();
        parts.extend(self.errors.iter().map(|(field, msg)| match msg {
            Value::String(s) => format!("{field}: {s}"),
            other => format!("{field}: {other}"),
        }));
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}
