//! Fatal errors that abort a sync run.
//!
//! Per-record and per-batch problems are not errors at this level; they are
//! recorded as [`SyncFailure`](crate::sync::SyncFailure) entries in the run
//! summary and the run carries on.

use thiserror::Error;

use crate::platform::PlatformError;

/// Invalid or incomplete configuration. Always detected before any record is fetched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Required connection parameters are empty.
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// The configured table does not exist in the base.
    #[error("target table not found: {0}")]
    TableNotFound(String),

    /// Mapped target field ids that are absent from the table schema.
    #[error(
        "field mappings reference unknown fields: {}\navailable fields: {}",
        .missing.join(", "),
        .available.join(", ")
    )]
    UnknownFields {
        /// `source -> target_field_id` descriptions of every bad mapping.
        missing: Vec<String>,
        /// `name (id)` descriptions of every field in the table.
        available: Vec<String>,
    },

    /// The field mapping could not be parsed or lacks a required entry.
    #[error("invalid field mapping: {0}")]
    InvalidFieldMap(String),

    /// A setting has an unusable value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The target schema could not be read.
    #[error("failed to read target schema: {0}")]
    Schema(#[source] PlatformError),

    /// The watermark could not be read after retries.
    #[error("failed to read sync watermark: {0}")]
    Watermark(#[source] PlatformError),

    /// The stored watermark is not a timestamp.
    #[error("stored watermark '{value}' is not a valid timestamp")]
    InvalidWatermark { value: String },

    /// Fetching issues failed after retries; nothing was written.
    #[error("failed to fetch issues: {0}")]
    Fetch(#[source] PlatformError),
}

impl SyncError {
    /// Whether this error stems from configuration rather than a remote failure.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameters_lists_every_name() {
        let err = ConfigurationError::MissingParameters(vec![
            "jira.server".to_string(),
            "airtable.api_key".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing required configuration: jira.server, airtable.api_key"
        );
    }

    #[test]
    fn unknown_fields_includes_available_schema() {
        let err = ConfigurationError::UnknownFields {
            missing: vec!["status -> fldNope".to_string()],
            available: vec!["Status (fldStatus)".to_string(), "Key (fldKey)".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("status -> fldNope"));
        assert!(msg.contains("Status (fldStatus), Key (fldKey)"));
    }

    #[test]
    fn sync_error_wraps_configuration() {
        let err: SyncError = ConfigurationError::InvalidFieldMap("empty".to_string()).into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("invalid field mapping: empty"));

        let err = SyncError::Fetch(PlatformError::network("timeout"));
        assert!(!err.is_configuration());
    }
}
