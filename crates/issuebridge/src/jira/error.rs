//! Error types for Jira API operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::platform::PlatformError;

/// Errors that can occur when interacting with the Jira API.
#[derive(Debug, Error)]
pub enum JiraError {
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

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<JiraError> for PlatformError {
    fn from(err: JiraError) -> Self {
        match err {
            JiraError::Http(message) => PlatformError::Network { message },
            JiraError::Json(e) => PlatformError::Internal {
                message: format!("JSON parse error: {}", e),
            },
            JiraError::Api { status, message } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::NotFound { resource: message },
                429 => PlatformError::RateLimited {
                    reset_at: Utc::now() + chrono::Duration::minutes(1),
                },
                _ => PlatformError::Api { status, message },
            },
            JiraError::RateLimited { reset_at } => PlatformError::RateLimited { reset_at },
            JiraError::Config(message) => PlatformError::Internal { message },
        }
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &JiraError) -> String {
    match err {
        JiraError::Http(_) => "Network error".to_string(),
        JiraError::Json(_) => "JSON parse error".to_string(),
        JiraError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        JiraError::RateLimited { .. } => "Rate limited".to_string(),
        JiraError::Config(msg) => format!("Config: {}", msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_to_platform_error() {
        let err = JiraError::Api {
            status: 404,
            message: "issue does not exist".to_string(),
        };
        let platform_err: PlatformError = err.into();
        assert!(matches!(platform_err, PlatformError::NotFound { .. }));

        let err = JiraError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(PlatformError::from(err), PlatformError::AuthRequired);

        let err = JiraError::Api {
            status: 400,
            message: "bad jql".to_string(),
        };
        assert_eq!(PlatformError::from(err), PlatformError::api(400, "bad jql"));
    }

    #[test]
    fn test_transport_failures_are_transient() {
        let platform_err: PlatformError = JiraError::Http("connection reset".to_string()).into();
        assert!(platform_err.is_transient());

        let platform_err: PlatformError = JiraError::Api {
            status: 429,
            message: "slow down".to_string(),
        }
        .into();
        assert!(platform_err.is_rate_limited());
    }

    #[test]
    fn test_short_error_message() {
        let err = JiraError::RateLimited {
            reset_at: Utc::now(),
        };
        assert_eq!(short_error_message(&err), "Rate limited");

        let err = JiraError::Api {
            status: 400,
            message: "x".repeat(80),
        };
        let msg = short_error_message(&err);
        assert!(msg.starts_with("HTTP 400: xxx"));
        assert!(msg.ends_with("..."));
    }
}
