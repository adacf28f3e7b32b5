//! Platform-agnostic seams for the two remotes.
//!
//! This module defines the [`IssueSource`] and [`RecordStore`] traits the sync
//! engine is written against, the shared [`PlatformError`] type both remotes
//! convert into, and the request pacing used by the concrete clients.
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::platform::{RecordQuery, RecordStore};
//!
//! async fn newest<S: RecordStore>(store: &S, field: &str) -> Result<(), PlatformError> {
//!     let records = store.list_records(&RecordQuery::latest_by(field)).await?;
//!     println!("{:?}", records.first());
//!     Ok(())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{IssueSource, RecordQuery, RecordStore, SortDirection};
