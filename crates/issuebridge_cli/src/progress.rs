//! Progress reporting for sync runs.

use issuebridge::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Wrap the reporter in a callback for the engine.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::WatermarkResolved { watermark } => match watermark {
                Some(watermark) => tracing::debug!(watermark = %watermark, "Incremental sync"),
                None => tracing::info!("No watermark, running a full sync"),
            },

            SyncProgress::FetchingIssues { jql, total } => {
                tracing::debug!(jql = %jql, total, "Fetching issues");
            }

            SyncProgress::FetchedPage {
                start_at,
                count,
                total_so_far,
            } => {
                tracing::debug!(start_at, count, total_so_far, "Fetched page");
            }

            SyncProgress::FetchComplete { total } => {
                tracing::info!(total, "Fetch complete");
            }

            SyncProgress::Transformed { count } => {
                tracing::debug!(count, "Built payloads");
            }

            SyncProgress::Matched { existing, new } => {
                tracing::debug!(existing, new, "Matched existing records");
            }

            SyncProgress::WritingBatch { operation, count } => {
                tracing::debug!(operation, count, "Writing batch");
            }

            SyncProgress::BatchFailed {
                operation,
                keys,
                error,
            } => {
                tracing::warn!(operation, keys = ?keys, error = %error, "Records not written");
            }

            SyncProgress::SelectOptionAdded { field_id, option } => {
                tracing::debug!(field_id = %field_id, option = %option, "Select option added");
            }

            SyncProgress::Linking { count } => {
                tracing::debug!(count, "Linking parents");
            }

            SyncProgress::LinkSkipped {
                child,
                parent,
                reason,
            } => {
                tracing::debug!(child = %child, parent = %parent, reason = %reason, "Link skipped");
            }

            SyncProgress::RetryBackoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    operation = %operation,
                    retry_after_ms,
                    attempt,
                    "Remote call failed, backing off"
                );
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            SyncProgress::SyncComplete { summary } => {
                tracing::debug!(
                    dry_run = summary.dry_run,
                    options_added = summary.options_added,
                    "Run finished"
                );
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
