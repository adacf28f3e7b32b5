//! Sync run options, summary, and constants.

use std::fmt;

use crate::retry::RetryConfig;

/// Default number of issues requested per search page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page the tracker's search endpoint will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default (and maximum) number of records per create/update request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Largest batch the store accepts in one request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Keys per lookup formula, keeping formulas under the store's URL limit.
pub const DEFAULT_MATCH_CHUNK_SIZE: usize = 50;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for a single remote call.
pub const MAX_RETRIES: usize = 3;

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Base query filter, e.g. `project = PROJ`.
    pub base_filter: String,
    /// Extra filter ANDed onto every query.
    pub extra_filter: Option<String>,
    /// Issues per search page.
    pub page_size: usize,
    /// Records per create/update request.
    pub batch_size: usize,
    /// Keys per lookup query.
    pub match_chunk_size: usize,
    /// Source field names whose values are timestamps to normalize.
    pub date_fields: Vec<String>,
    /// Retry policy for every remote call.
    pub retry: RetryConfig,
    /// Dry run mode - fetch and match, but don't write.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            base_filter: String::new(),
            extra_filter: None,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            match_chunk_size: DEFAULT_MATCH_CHUNK_SIZE,
            date_fields: vec![
                "created".to_string(),
                "updated".to_string(),
                "resolutiondate".to_string(),
            ],
            retry: RetryConfig::default(),
            dry_run: false,
        }
    }
}

impl SyncOptions {
    /// Page size clamped to what the tracker accepts.
    #[must_use]
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Batch size clamped to what the store accepts.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    #[must_use]
    pub fn effective_match_chunk_size(&self) -> usize {
        self.match_chunk_size.max(1)
    }
}

/// Category of a recovered, per-record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A field value could not be derived; the field was omitted.
    FieldExtraction,
    /// Existing records could not be looked up; the keys were not written.
    Match,
    /// A create/update request failed.
    BatchWrite,
    /// A parent or child record could not be resolved for linking.
    UnresolvedLink,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FieldExtraction => "field extraction",
            Self::Match => "match",
            Self::BatchWrite => "batch write",
            Self::UnresolvedLink => "unresolved link",
        };
        f.write_str(name)
    }
}

/// A failure that was recovered from without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub kind: FailureKind,
    /// Identity keys affected.
    pub keys: Vec<String>,
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: FailureKind, keys: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            keys,
            message: message.into(),
        }
    }
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Issues fetched from the tracker.
    pub fetched: usize,
    /// Payloads built.
    pub transformed: usize,
    /// Records created.
    pub created: usize,
    /// Records updated.
    pub updated: usize,
    /// Parent links written.
    pub linked: usize,
    /// Select choices added to the target schema.
    pub options_added: usize,
    /// Whether this was a dry run (nothing written).
    pub dry_run: bool,
    /// Recovered failures.
    pub failures: Vec<SyncFailure>,
}

impl SyncSummary {
    /// Failures of one category.
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &SyncFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    /// Identity keys affected by failures of one category.
    #[must_use]
    pub fn failed_keys(&self, kind: FailureKind) -> Vec<&str> {
        self.failures_of(kind)
            .flat_map(|f| f.keys.iter().map(String::as_str))
            .collect()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
