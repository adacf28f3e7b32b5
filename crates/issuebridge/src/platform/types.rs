use async_trait::async_trait;

use crate::record::{Fields, SourceRecord, StoreRecord};
use crate::schema::TableSchema;

use super::errors::Result;

/// Sort direction for record queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A query against the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Filter formula, e.g. `OR({Jira Key}='A-1',{Jira Key}='A-2')`.
    pub formula: Option<String>,
    /// Field id to sort by, with direction.
    pub sort: Option<(String, SortDirection)>,
    /// Maximum number of records to return across all pages.
    pub max_records: Option<usize>,
}

impl RecordQuery {
    /// Query filtered by a formula.
    pub fn filtered(formula: impl Into<String>) -> Self {
        Self {
            formula: Some(formula.into()),
            ..Self::default()
        }
    }

    /// Query for the single record with the greatest value in `field_id`.
    pub fn latest_by(field_id: impl Into<String>) -> Self {
        Self {
            formula: None,
            sort: Some((field_id.into(), SortDirection::Desc)),
            max_records: Some(1),
        }
    }
}

/// The issue tracker records are read from.
///
/// Implementations should convert their own errors to `PlatformError`; they
/// must not retry internally, the engine wraps every call in its retry policy.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// IANA timezone of the authenticated user, used to phrase date filters.
    ///
    /// `Ok(None)` means the tracker did not report one.
    async fn server_timezone(&self) -> Result<Option<String>>;

    /// Total number of issues matching `jql`.
    async fn count_issues(&self, jql: &str) -> Result<usize>;

    /// One page of issues matching `jql`, with changelog and comments expanded.
    async fn search_issues(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<SourceRecord>>;
}

/// The tabular store records are written to.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the target table's schema.
    async fn fetch_schema(&self) -> Result<TableSchema>;

    /// List records matching a query. Field values are keyed by field id.
    async fn list_records(&self, query: &RecordQuery) -> Result<Vec<StoreRecord>>;

    /// Create records in one request. Returns the created records in input order.
    async fn create_records(&self, records: &[Fields]) -> Result<Vec<StoreRecord>>;

    /// Update records in one request. Returns the updated records in input order.
    async fn update_records(&self, records: &[(String, Fields)]) -> Result<Vec<StoreRecord>>;

    /// Replace a select field's list of choices.
    async fn update_field_choices(
        &self,
        table_id: &str,
        field_id: &str,
        choices: &[String],
    ) -> Result<()>;
}
