//! Paginated issue fetching.

use crate::error::SyncError;
use crate::platform::IssueSource;
use crate::record::SourceRecord;
use crate::retry::{RetryConfig, retry_platform};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Fetch every issue matching `jql`, in key order.
///
/// The total is read once up front and bounds the fetch: issues that start
/// matching mid-fetch are left for the next run. Any page that still fails
/// after retries aborts the whole fetch.
pub(crate) async fn fetch_issues<S: IssueSource + ?Sized>(
    source: &S,
    jql: &str,
    page_size: usize,
    retry: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<Vec<SourceRecord>, SyncError> {
    let total = retry_platform(
        || source.count_issues(jql),
        "count issues",
        retry,
        on_progress,
    )
    .await
    .map_err(SyncError::Fetch)?;

    tracing::info!(total, jql, "Fetching issues");
    emit(
        on_progress,
        SyncProgress::FetchingIssues {
            jql: jql.to_string(),
            total,
        },
    );

    let mut issues: Vec<SourceRecord> = Vec::with_capacity(total);
    while issues.len() < total {
        let start_at = issues.len();
        let max_results = page_size.min(total - start_at);

        let page = retry_platform(
            || source.search_issues(jql, start_at, max_results),
            "fetch issue page",
            retry,
            on_progress,
        )
        .await
        .map_err(SyncError::Fetch)?;

        if page.is_empty() {
            tracing::warn!(
                start_at,
                total,
                "Tracker returned an empty page before the expected total"
            );
            emit(
                on_progress,
                SyncProgress::Warning {
                    message: format!(
                        "expected {total} issues but the tracker stopped at {start_at}"
                    ),
                },
            );
            break;
        }

        let count = page.len();
        issues.extend(page.into_iter().take(total - start_at));

        tracing::debug!(start_at, count, "Fetched issue page");
        emit(
            on_progress,
            SyncProgress::FetchedPage {
                start_at,
                count,
                total_so_far: issues.len(),
            },
        );
    }

    emit(
        on_progress,
        SyncProgress::FetchComplete {
            total: issues.len(),
        },
    );
    Ok(issues)
}
