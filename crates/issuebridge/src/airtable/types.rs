//! Airtable API data types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::StoreRecord;
use crate::schema::{FieldSchema, TableSchema};

/// `GET /v0/meta/bases/{base}/tables`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TablesResponse {
    pub tables: Vec<TableMeta>,
}

/// Table metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct TableMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

/// Field metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub options: Option<FieldOptions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldOptions {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    pub name: String,
}

impl From<TableMeta> for TableSchema {
    fn from(table: TableMeta) -> Self {
        TableSchema {
            id: table.id,
            name: table.name,
            fields: table
                .fields
                .into_iter()
                .map(|f| FieldSchema {
                    id: f.id,
                    name: f.name,
                    field_type: f.field_type,
                    choices: f
                        .options
                        .map(|o| o.choices.into_iter().map(|c| c.name).collect())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// A record as returned by list/create/update.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl From<ApiRecord> for StoreRecord {
    fn from(record: ApiRecord) -> Self {
        StoreRecord {
            id: record.id,
            fields: record.fields,
        }
    }
}

/// One page of `GET /v0/{base}/{table}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub records: Vec<ApiRecord>,
    #[serde(default)]
    pub offset: Option<String>,
}

/// Response to create/update.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RecordsResponse {
    #[serde(default)]
    pub records: Vec<ApiRecord>,
}

/// Error envelope. `error` is either an object or a bare code string.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorDetail {
    Typed {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        message: String,
    },
    Code(String),
}

impl ErrorDetail {
    pub(crate) fn error_type(&self) -> &str {
        match self {
            Self::Typed { error_type, .. } => error_type,
            Self::Code(code) => code,
        }
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Typed { message, .. } => message,
            Self::Code(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_meta_converts_to_schema_with_choices() {
        let meta: TableMeta = serde_json::from_value(json!({
            "id": "tblIssues",
            "name": "Issues",
            "primaryFieldId": "fldKey",
            "fields": [
                { "id": "fldKey", "name": "Jira Key", "type": "singleLineText" },
                {
                    "id": "fldStatus",
                    "name": "Status",
                    "type": "singleSelect",
                    "options": { "choices": [
                        { "id": "sel1", "name": "To Do", "color": "blueLight2" },
                        { "id": "sel2", "name": "Done" }
                    ] }
                }
            ]
        }))
        .unwrap();

        let schema = TableSchema::from(meta);
        assert_eq!(schema.id, "tblIssues");
        assert_eq!(schema.fields.len(), 2);
        let status = schema.field("fldStatus").unwrap();
        assert!(status.is_select());
        assert_eq!(status.choices, vec!["To Do", "Done"]);
        assert!(schema.field("fldKey").unwrap().choices.is_empty());
    }

    #[test]
    fn error_envelope_accepts_both_shapes() {
        let typed: ErrorEnvelope = serde_json::from_value(json!({
            "error": { "type": "INVALID_REQUEST_UNKNOWN", "message": "Invalid request" }
        }))
        .unwrap();
        assert_eq!(typed.error.error_type(), "INVALID_REQUEST_UNKNOWN");
        assert_eq!(typed.error.message(), "Invalid request");

        let code: ErrorEnvelope = serde_json::from_value(json!({ "error": "NOT_FOUND" })).unwrap();
        assert_eq!(code.error.error_type(), "NOT_FOUND");
        assert_eq!(code.error.message(), "");
    }
}
