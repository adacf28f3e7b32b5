//! Error types for Airtable API operations.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use crate::platform::PlatformError;

/// Error type Airtable reports when a select field rejects a value.
pub const INVALID_SELECT_OPTION_TYPE: &str = "INVALID_MULTIPLE_CHOICE_OPTIONS";

/// Airtable doubles the quotes around the option in some messages.
static SELECT_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"select option "+([^"]+)"+"#).expect("select option regex is valid")
});

/// Errors that can occur when interacting with the Airtable API.
#[derive(Debug, Error)]
pub enum AirtableError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// A select field rejected a value that is not one of its choices.
    #[error("Unknown select option \"{option}\": {message}")]
    InvalidSelectOption { option: String, message: String },

    /// The configured table does not exist in the base.
    #[error("Table '{table}' not found in base {base_id}; available tables: {}", .available.join(", "))]
    TableNotFound {
        table: String,
        base_id: String,
        available: Vec<String>,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<AirtableError> for PlatformError {
    fn from(err: AirtableError) -> Self {
        match err {
            AirtableError::Http(message) => PlatformError::Network { message },
            AirtableError::Json(e) => PlatformError::Internal {
                message: format!("JSON parse error: {}", e),
            },
            AirtableError::Api { status, message } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::NotFound { resource: message },
                429 => PlatformError::RateLimited {
                    reset_at: Utc::now() + chrono::Duration::seconds(30),
                },
                _ => PlatformError::Api { status, message },
            },
            AirtableError::RateLimited { reset_at } => PlatformError::RateLimited { reset_at },
            AirtableError::InvalidSelectOption { option, message } => {
                PlatformError::InvalidSelectOption { option, message }
            }
            err @ AirtableError::TableNotFound { .. } => PlatformError::NotFound {
                resource: err.to_string(),
            },
            AirtableError::Config(message) => PlatformError::Internal { message },
        }
    }
}

/// Extract the rejected option from an Airtable select-option error message.
pub fn parse_select_option(message: &str) -> Option<String> {
    SELECT_OPTION_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &AirtableError) -> String {
    match err {
        AirtableError::Http(_) => "Network error".to_string(),
        AirtableError::Json(_) => "JSON parse error".to_string(),
        AirtableError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        AirtableError::RateLimited { .. } => "Rate limited".to_string(),
        AirtableError::InvalidSelectOption { option, .. } => {
            format!("Unknown select option: {}", option)
        }
        AirtableError::TableNotFound { table, .. } => format!("Table not found: {}", table),
        AirtableError::Config(msg) => format!("Config: {}", msg),
    }
}
