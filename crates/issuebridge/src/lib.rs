//! Issuebridge - incremental one-way sync of Jira issues into Airtable.
//!
//! Each run reads a watermark from the target table, fetches the issues that
//! changed since, maps their fields onto the table's columns and writes them
//! as batched creates and updates. Parent links are written in a second pass
//! once every record exists.
//!
//! # Features
//!
//! - `jira` - The Jira Cloud REST client ([`jira::JiraClient`]).
//! - `airtable` - The Airtable REST client ([`airtable::AirtableClient`]).
//!
//! Both are enabled by default. Without them the engine still runs against
//! any [`IssueSource`] and [`RecordStore`] implementation.
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::{AirtableClient, JiraClient, SyncConfig, SyncEngine};
//!
//! config.validate()?;
//! let jira = JiraClient::from_connection(&config.jira, Some(limiter.clone()))?;
//! let airtable = AirtableClient::from_connection(&config.airtable, Some(limiter))?;
//!
//! let engine = SyncEngine::new(&jira, &airtable, config.field_map.clone(), config.sync_options());
//! let summary = engine.sync(None).await?;
//! println!("created {}, updated {}", summary.created, summary.updated);
//! ```

pub mod airtable;
pub mod config;
pub mod error;
pub mod http;
#[cfg(feature = "jira")]
pub mod jira;
pub mod mapping;
pub mod platform;
pub mod record;
pub mod retry;
pub mod schema;
pub mod sync;

#[cfg(feature = "airtable")]
pub use airtable::AirtableClient;
pub use config::{AirtableConnection, JiraConnection, SyncConfig};
pub use error::{ConfigurationError, SyncError};
#[cfg(feature = "jira")]
pub use jira::JiraClient;
pub use mapping::{FieldMapping, MappingEntry};
pub use platform::{
    ApiRateLimiter, IssueSource, PlatformError, RecordQuery, RecordStore, SortDirection,
    rate_limits,
};
pub use record::{ChangelogEntry, Comment, Fields, SourceRecord, StoreRecord};
pub use retry::RetryConfig;
pub use schema::{FieldSchema, SchemaValidator, TableSchema};
pub use sync::{
    FailureKind, ProgressCallback, SyncEngine, SyncFailure, SyncOptions, SyncProgress,
    SyncSummary,
};
