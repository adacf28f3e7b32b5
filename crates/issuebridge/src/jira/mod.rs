//! Jira REST client: the issue source.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for Jira API operations
//! - [`types`] - Response structures
//! - [`client`] - The client and its [`IssueSource`](crate::platform::IssueSource) impl
//! - [`convert`] - Conversion of Jira issues to [`SourceRecord`](crate::record::SourceRecord)
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::jira::JiraClient;
//! use issuebridge::platform::IssueSource;
//!
//! let client = JiraClient::new("https://example.atlassian.net", "bot@example.com", "token", None)?;
//! let total = client.count_issues("project = PROJ").await?;
//! ```

mod client;
mod convert;
mod error;
mod types;

pub use client::JiraClient;
pub use convert::to_source_record;
pub use error::{JiraError, short_error_message};
pub use types::{JiraIssue, JiraUser, SearchResponse};
