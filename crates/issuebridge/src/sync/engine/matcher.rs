//! Looking up existing target records by identity key.

use std::collections::HashMap;

use crate::airtable::formula;
use crate::platform::{PlatformError, RecordQuery, RecordStore};
use crate::retry::{RetryConfig, retry_platform};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Result of a lookup: found ids, plus the keys whose lookup failed.
#[derive(Debug, Default)]
pub(crate) struct MatchOutcome {
    /// Identity key to target record id.
    pub ids: HashMap<String, String>,
    /// Keys of chunks that could not be looked up, with the error.
    pub failed: Vec<(Vec<String>, PlatformError)>,
}

impl MatchOutcome {
    pub(crate) fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failed
            .iter()
            .flat_map(|(keys, _)| keys.iter().map(String::as_str))
    }
}

/// Finds target records by the field carrying the identity key.
pub(crate) struct RecordMatcher<'a, R: ?Sized> {
    pub store: &'a R,
    /// Field id the key is read from in returned records.
    pub key_field_id: &'a str,
    /// Field name the lookup formula compares against.
    pub key_field_name: &'a str,
    pub chunk_size: usize,
    pub retry: &'a RetryConfig,
    pub on_progress: Option<&'a ProgressCallback>,
}

impl<R: RecordStore + ?Sized> RecordMatcher<'_, R> {
    /// Look up `keys` in chunks of `chunk_size` (one OR formula per chunk).
    ///
    /// A key found on two records is reported and the later record wins;
    /// duplicates are never merged or deleted. A failed chunk does not stop
    /// the remaining chunks.
    pub(crate) async fn match_existing(&self, keys: &[String]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for chunk in keys.chunks(self.chunk_size.max(1)) {
            let query = RecordQuery::filtered(formula::any_equals(self.key_field_name, chunk));
            let result = retry_platform(
                || self.store.list_records(&query),
                "match existing records",
                self.retry,
                self.on_progress,
            )
            .await;

            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(keys = ?chunk, "Failed to look up existing records: {}", e);
                    outcome.failed.push((chunk.to_vec(), e));
                    continue;
                }
            };

            for record in records {
                let Some(key) = record.field_str(self.key_field_id) else {
                    continue;
                };
                if let Some(previous) = outcome.ids.insert(key.to_string(), record.id.clone())
                    && previous != record.id
                {
                    tracing::warn!(
                        key,
                        kept = %record.id,
                        other = %previous,
                        "Duplicate target records for one issue"
                    );
                    emit(
                        self.on_progress,
                        SyncProgress::Warning {
                            message: format!(
                                "duplicate records for {key}: {previous} and {}, keeping the latter",
                                record.id
                            ),
                        },
                    );
                }
            }
        }

        outcome
    }
}
