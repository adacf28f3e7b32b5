//! Progress reporting types for sync runs.
//!
//! The engine reports every phase through an explicit callback rather than a
//! global logger, so callers decide how (and whether) to present progress.

use super::types::SyncSummary;

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// The watermark was read from the target store.
    WatermarkResolved {
        /// Latest synced "updated" value, or `None` for a full sync.
        watermark: Option<String>,
    },

    /// Starting to fetch issues.
    FetchingIssues {
        /// The complete query sent to the tracker.
        jql: String,
        /// Total matching issues at the start of the fetch.
        total: usize,
    },

    /// Fetched a page of issues.
    FetchedPage {
        /// Offset of the first issue on this page.
        start_at: usize,
        /// Number of issues on this page.
        count: usize,
        /// Running total fetched so far.
        total_so_far: usize,
    },

    /// Finished fetching issues.
    FetchComplete {
        /// Total number of issues fetched.
        total: usize,
    },

    /// Built target payloads for the fetched issues.
    Transformed {
        /// Number of payloads built.
        count: usize,
    },

    /// Matched issue keys against existing target records.
    Matched {
        /// Keys with an existing target record.
        existing: usize,
        /// Keys needing a new record.
        new: usize,
    },

    /// Writing a chunk of records.
    WritingBatch {
        /// `"create"` or `"update"`.
        operation: &'static str,
        /// Number of records in the chunk.
        count: usize,
    },

    /// A chunk (or single record) could not be written.
    BatchFailed {
        /// `"create"` or `"update"`.
        operation: &'static str,
        /// Identity keys of the records that were not written.
        keys: Vec<String>,
        /// Error message.
        error: String,
    },

    /// A missing choice was added to a select field.
    SelectOptionAdded {
        /// Target field id.
        field_id: String,
        /// The added choice.
        option: String,
    },

    /// Starting the parent-linking pass.
    Linking {
        /// Number of child records with a parent.
        count: usize,
    },

    /// A parent link could not be resolved.
    LinkSkipped {
        /// Child identity key.
        child: String,
        /// Parent identity key.
        parent: String,
        /// Which side could not be resolved.
        reason: String,
    },

    /// A remote call failed transiently, backing off before retry.
    RetryBackoff {
        /// What was being attempted.
        operation: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Current attempt number.
        attempt: u32,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },

    /// The run finished.
    SyncComplete {
        /// Run summary.
        summary: SyncSummary,
    },
}

/// Callback for progress updates during sync runs.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use issuebridge::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn report(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::FetchComplete { total: 42 });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
