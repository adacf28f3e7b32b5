//! The sync engine: one run from watermark to parent links.
//!
//! A run is strictly sequential:
//!
//! 1. read and validate the target schema
//! 2. read the watermark and build the incremental query
//! 3. fetch every matching issue
//! 4. transform issues into target payloads
//! 5. look up existing records by identity key
//! 6. create new records, update existing ones
//! 7. link children to parents in a second pass
//!
//! Only configuration problems and failures before anything is written abort
//! the run. Everything after that is recorded in the [`SyncSummary`] and the
//! run carries on.
//!
//! # Example
//!
//! ```ignore
//! use issuebridge::sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(&jira, &airtable, mapping, options);
//! let summary = engine.sync(Some(&progress)).await?;
//! ```

mod extract;
mod fetch;
mod link;
mod matcher;
mod transform;
mod watermark;
mod writer;

use std::collections::{HashMap, HashSet};

use chrono_tz::Tz;

use crate::error::{ConfigurationError, SyncError};
use crate::mapping::{FieldMapping, logical};
use crate::platform::{IssueSource, PlatformError, RecordStore};
use crate::record::SourceRecord;
use crate::retry::{RetryConfig, retry_platform};
use crate::schema::{SchemaValidator, TableSchema};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{FailureKind, SyncFailure, SyncOptions, SyncSummary};

pub use extract::{ExtractError, FieldShape, extract_field, normalize_timestamp};
pub use transform::{TransformedIssue, transform_issue};

use fetch::fetch_issues;
use link::link_parents;
use matcher::RecordMatcher;
use watermark::{build_jql, format_watermark, latest_watermark, resolve_timezone};
use writer::BatchWriter;

/// Read the target schema and check the mapping against it.
///
/// A missing table or a mapping that names unknown fields is a
/// configuration error; any other failure to read the schema is
/// [`SyncError::Schema`].
pub async fn load_schema<R: RecordStore + ?Sized>(
    store: &R,
    mapping: &FieldMapping,
    retry: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<TableSchema, SyncError> {
    let schema = retry_platform(
        || store.fetch_schema(),
        "read target schema",
        retry,
        on_progress,
    )
    .await
    .map_err(|e| match e {
        PlatformError::NotFound { resource } => {
            SyncError::Configuration(ConfigurationError::TableNotFound(resource))
        }
        other => SyncError::Schema(other),
    })?;

    SchemaValidator::validate(&schema, mapping)?;
    Ok(schema)
}

/// Drop repeated keys, keeping the last occurrence at the first position.
fn dedupe_by_key(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<SourceRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.key) {
            Some(&index) => {
                tracing::debug!(key = %record.key, "Issue returned twice, keeping the later copy");
                unique[index] = record;
            }
            None => {
                positions.insert(record.key.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

/// Incremental one-way sync from an [`IssueSource`] into a [`RecordStore`].
pub struct SyncEngine<'a, S: ?Sized, R: ?Sized> {
    source: &'a S,
    store: &'a R,
    mapping: FieldMapping,
    options: SyncOptions,
}

impl<'a, S, R> SyncEngine<'a, S, R>
where
    S: IssueSource + ?Sized,
    R: RecordStore + ?Sized,
{
    pub fn new(source: &'a S, store: &'a R, mapping: FieldMapping, options: SyncOptions) -> Self {
        Self {
            source,
            store,
            mapping,
            options,
        }
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync.
    ///
    /// # Errors
    ///
    /// Fails before anything is written if the schema or mapping is invalid,
    /// the watermark cannot be read, or the fetch fails after retries.
    pub async fn sync(
        &self,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncSummary, SyncError> {
        let retry = &self.options.retry;

        let schema = load_schema(self.store, &self.mapping, retry, on_progress).await?;
        let key_field_id = self.mapping.key_field().ok_or_else(|| {
            ConfigurationError::InvalidFieldMap(format!("'{}' is not mapped", logical::KEY))
        })?;
        let key_field_name = schema.field_name(key_field_id);

        let watermark =
            latest_watermark(self.store, self.mapping.updated_field(), retry, on_progress).await?;
        let watermark = match watermark {
            Some(instant) => {
                let tz = self.tracker_timezone(on_progress).await;
                Some(format_watermark(instant, tz))
            }
            None => None,
        };
        tracing::info!(watermark = ?watermark, "Resolved sync watermark");
        emit(
            on_progress,
            SyncProgress::WatermarkResolved {
                watermark: watermark.clone(),
            },
        );

        let jql = build_jql(
            &self.options.base_filter,
            watermark.as_deref(),
            self.options.extra_filter.as_deref(),
        );
        let records = fetch_issues(
            self.source,
            &jql,
            self.options.effective_page_size(),
            retry,
            on_progress,
        )
        .await?;

        let mut summary = SyncSummary {
            fetched: records.len(),
            dry_run: self.options.dry_run,
            ..SyncSummary::default()
        };
        let records = dedupe_by_key(records);

        let issues: Vec<TransformedIssue> = records
            .iter()
            .map(|record| transform_issue(record, &self.mapping, &self.options.date_fields))
            .collect();
        for issue in &issues {
            summary.failures.extend(issue.errors.iter().map(|e| {
                SyncFailure::new(FailureKind::FieldExtraction, vec![issue.key.clone()], e.to_string())
            }));
        }
        summary.transformed = issues.len();
        emit(
            on_progress,
            SyncProgress::Transformed {
                count: issues.len(),
            },
        );

        let matcher = RecordMatcher {
            store: self.store,
            key_field_id,
            key_field_name,
            chunk_size: self.options.effective_match_chunk_size(),
            retry,
            on_progress,
        };
        let keys: Vec<String> = issues.iter().map(|issue| issue.key.clone()).collect();
        let matched = matcher.match_existing(&keys).await;
        for (keys, error) in &matched.failed {
            summary.failures.push(SyncFailure::new(
                FailureKind::Match,
                keys.clone(),
                format!("lookup failed: {error}"),
            ));
        }
        let unmatched: HashSet<&str> = matched.failed_keys().collect();

        let parent_field_id = self.mapping.parent_field();
        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut links = Vec::new();
        for issue in issues {
            if unmatched.contains(issue.key.as_str()) {
                continue;
            }
            if parent_field_id.is_some()
                && let Some(parent) = &issue.parent_key
            {
                links.push((issue.key.clone(), parent.clone()));
            }
            match matched.ids.get(&issue.key) {
                Some(id) => updates.push((issue.key, id.clone(), issue.fields)),
                None => creates.push((issue.key, issue.fields)),
            }
        }

        tracing::info!(
            existing = updates.len(),
            new = creates.len(),
            "Matched issues against target records"
        );
        emit(
            on_progress,
            SyncProgress::Matched {
                existing: updates.len(),
                new: creates.len(),
            },
        );

        if self.options.dry_run {
            summary.created = creates.len();
            summary.updated = updates.len();
            tracing::info!(
                create = summary.created,
                update = summary.updated,
                links = links.len(),
                "Dry run, nothing written"
            );
            emit(
                on_progress,
                SyncProgress::SyncComplete {
                    summary: summary.clone(),
                },
            );
            return Ok(summary);
        }

        let writer = BatchWriter {
            store: self.store,
            batch_size: self.options.effective_batch_size(),
            retry,
            on_progress,
        };

        let created = writer.create_batch(creates).await;
        summary.created = created.written.len();
        summary.options_added += created.options_added;
        summary.failures.extend(created.failures);

        let updated = writer.update_batch(updates).await;
        summary.updated = updated.written.len();
        summary.options_added += updated.options_added;
        summary.failures.extend(updated.failures);

        if let Some(parent_field_id) = parent_field_id {
            let linked = link_parents(&links, parent_field_id, &matcher, &writer).await;
            summary.linked = linked.linked;
            summary.options_added += linked.options_added;
            summary.failures.extend(linked.failures);
        }

        tracing::info!(
            fetched = summary.fetched,
            created = summary.created,
            updated = summary.updated,
            linked = summary.linked,
            failures = summary.failures.len(),
            "Sync complete"
        );
        emit(
            on_progress,
            SyncProgress::SyncComplete {
                summary: summary.clone(),
            },
        );
        Ok(summary)
    }

    /// The tracker user's timezone, or UTC if it cannot be read.
    async fn tracker_timezone(&self, on_progress: Option<&ProgressCallback>) -> Tz {
        let result = retry_platform(
            || self.source.server_timezone(),
            "read tracker timezone",
            &self.options.retry,
            on_progress,
        )
        .await;

        match result {
            Ok(name) => resolve_timezone(name.as_deref()),
            Err(e) => {
                tracing::warn!("Could not read tracker timezone, using UTC: {}", e);
                emit(
                    on_progress,
                    SyncProgress::Warning {
                        message: format!("tracker timezone unavailable, using UTC: {e}"),
                    },
                );
                Tz::UTC
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dedupe_keeps_last_copy_in_first_position() {
        let records = vec![
            SourceRecord::new("A-1").with_field("summary", json!("old")),
            SourceRecord::new("A-2"),
            SourceRecord::new("A-1").with_field("summary", json!("new")),
        ];

        let unique = dedupe_by_key(records);
        let keys: Vec<&str> = unique.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A-1", "A-2"]);
        assert_eq!(unique[0].fields.get("summary"), Some(&json!("new")));
    }
}
