//! The incremental sync engine.
//!
//! # Module Structure
//!
//! - [`types`] - Run options, summary, failures, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - `SyncEngine` and its phases: watermark, fetch, transform,
//!   match, write, link
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(&jira, &airtable, mapping, options);
//! let summary = engine.sync(Some(&progress)).await?;
//! println!("created {}, updated {}", summary.created, summary.updated);
//! ```

pub mod engine;
mod progress;
mod types;

// Re-export types
pub use types::{FailureKind, SyncFailure, SyncOptions, SyncSummary};

// Re-export constants
pub use types::{
    DEFAULT_BATCH_SIZE, DEFAULT_MATCH_CHUNK_SIZE, DEFAULT_PAGE_SIZE, INITIAL_BACKOFF_MS,
    MAX_BACKOFF_MS, MAX_BATCH_SIZE, MAX_PAGE_SIZE, MAX_RETRIES,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

// Re-export the engine for convenience
pub use engine::{
    ExtractError, FieldShape, SyncEngine, TransformedIssue, extract_field, load_schema,
    normalize_timestamp, transform_issue,
};
