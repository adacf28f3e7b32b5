//! Batched creates and updates with failure isolation.
//!
//! Records are written in chunks of at most the store's batch size. A chunk
//! that fails does not stop the others. Two recoveries are attempted before a
//! record is given up on:
//!
//! - an unknown select option is added to the field's choices and the chunk
//!   is retried once; if that retry is rejected too, the chunk fails
//! - a chunk rejected for any other non-transient reason is retried record
//!   by record, so only the offending records fail

use std::slice;

use serde_json::Value;

use crate::platform::{PlatformError, RecordStore, short_error_message};
use crate::record::{Fields, StoreRecord};
use crate::retry::{RetryConfig, retry_platform};
use crate::schema::FieldSchema;
use crate::sync::{FailureKind, ProgressCallback, SyncFailure, SyncProgress, emit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Create,
    Update,
}

impl WriteOp {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// One record to write, tagged with the identity key for reporting.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub key: String,
    /// Target record id; required for updates.
    pub record_id: Option<String>,
    pub fields: Fields,
}

#[derive(Debug, Default)]
pub(crate) struct WriteOutcome {
    /// Written records with their identity keys.
    pub written: Vec<(String, StoreRecord)>,
    pub failures: Vec<SyncFailure>,
    /// Choices added to select fields along the way.
    pub options_added: usize,
}

pub(crate) struct BatchWriter<'a, R: ?Sized> {
    pub store: &'a R,
    pub batch_size: usize,
    pub retry: &'a RetryConfig,
    pub on_progress: Option<&'a ProgressCallback>,
}

fn carries_option(value: Option<&Value>, option: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == option,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(option)),
        _ => false,
    }
}

impl<R: RecordStore + ?Sized> BatchWriter<'_, R> {
    /// Create records from `(key, fields)` payloads.
    pub(crate) async fn create_batch(&self, payloads: Vec<(String, Fields)>) -> WriteOutcome {
        let items = payloads
            .into_iter()
            .map(|(key, fields)| PendingWrite {
                key,
                record_id: None,
                fields,
            })
            .collect();
        self.write_all(WriteOp::Create, items).await
    }

    /// Update records from `(key, record_id, fields)` payloads.
    pub(crate) async fn update_batch(
        &self,
        payloads: Vec<(String, String, Fields)>,
    ) -> WriteOutcome {
        let items = payloads
            .into_iter()
            .map(|(key, id, fields)| PendingWrite {
                key,
                record_id: Some(id),
                fields,
            })
            .collect();
        self.write_all(WriteOp::Update, items).await
    }

    async fn write_all(&self, op: WriteOp, items: Vec<PendingWrite>) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();

        for chunk in items.chunks(self.batch_size.max(1)) {
            emit(
                self.on_progress,
                SyncProgress::WritingBatch {
                    operation: op.as_str(),
                    count: chunk.len(),
                },
            );
            self.write_chunk(op, chunk, &mut outcome).await;
        }

        outcome
    }

    async fn write_chunk(&self, op: WriteOp, chunk: &[PendingWrite], outcome: &mut WriteOutcome) {
        match self.write_with_remediation(op, chunk, outcome).await {
            Ok(records) => Self::record_success(chunk, records, outcome),
            Err(e)
                if chunk.len() > 1 && !e.is_transient() && e.invalid_select_option().is_none() =>
            {
                tracing::warn!(
                    operation = op.as_str(),
                    count = chunk.len(),
                    "Batch rejected ({}), retrying records individually",
                    short_error_message(&e)
                );
                for item in chunk {
                    let single = slice::from_ref(item);
                    match self.write_with_remediation(op, single, outcome).await {
                        Ok(records) => Self::record_success(single, records, outcome),
                        Err(e) => self.record_failure(op, single, &e, outcome),
                    }
                }
            }
            Err(e) => self.record_failure(op, chunk, &e, outcome),
        }
    }

    /// Write a chunk; on an unknown select option, add it and retry once.
    async fn write_with_remediation(
        &self,
        op: WriteOp,
        chunk: &[PendingWrite],
        outcome: &mut WriteOutcome,
    ) -> Result<Vec<StoreRecord>, PlatformError> {
        let err = match self.send(op, chunk).await {
            Ok(records) => return Ok(records),
            Err(e) => e,
        };
        let Some(option) = err.invalid_select_option().map(str::to_string) else {
            return Err(err);
        };

        match self.add_select_option(&option, chunk).await {
            Ok(added) => outcome.options_added += added,
            Err(e) => {
                tracing::warn!(option, "Could not add select option: {}", e);
                return Err(err);
            }
        }

        self.send(op, chunk).await
    }

    async fn send(
        &self,
        op: WriteOp,
        chunk: &[PendingWrite],
    ) -> Result<Vec<StoreRecord>, PlatformError> {
        match op {
            WriteOp::Create => {
                let records: Vec<Fields> = chunk.iter().map(|p| p.fields.clone()).collect();
                retry_platform(
                    || self.store.create_records(&records),
                    "create records",
                    self.retry,
                    self.on_progress,
                )
                .await
            }
            WriteOp::Update => {
                let records: Vec<(String, Fields)> = chunk
                    .iter()
                    .filter_map(|p| p.record_id.clone().map(|id| (id, p.fields.clone())))
                    .collect();
                retry_platform(
                    || self.store.update_records(&records),
                    "update records",
                    self.retry,
                    self.on_progress,
                )
                .await
            }
        }
    }

    /// Add `option` to every select field in the chunk that holds it.
    ///
    /// The schema is re-read first, so the patch carries the current choices
    /// and a choice added since the run started is not added twice.
    async fn add_select_option(
        &self,
        option: &str,
        chunk: &[PendingWrite],
    ) -> Result<usize, PlatformError> {
        let schema = retry_platform(
            || self.store.fetch_schema(),
            "re-read schema",
            self.retry,
            self.on_progress,
        )
        .await?;

        let fields: Vec<&FieldSchema> = schema
            .fields
            .iter()
            .filter(|f| {
                f.is_select()
                    && chunk
                        .iter()
                        .any(|p| carries_option(p.fields.get(&f.id), option))
            })
            .collect();

        if fields.is_empty() {
            return Err(PlatformError::internal(format!(
                "no select field in the batch holds '{option}'"
            )));
        }

        let mut added = 0;
        for field in fields {
            if field.has_choice(option) {
                tracing::debug!(field = %field.name, option, "Select option already present");
                continue;
            }

            let mut choices = field.choices.clone();
            choices.push(option.to_string());
            retry_platform(
                || {
                    self.store
                        .update_field_choices(&schema.id, &field.id, &choices)
                },
                "add select option",
                self.retry,
                self.on_progress,
            )
            .await?;

            added += 1;
            tracing::info!(field = %field.name, option, "Added select option");
            emit(
                self.on_progress,
                SyncProgress::SelectOptionAdded {
                    field_id: field.id.clone(),
                    option: option.to_string(),
                },
            );
        }

        Ok(added)
    }

    fn record_success(chunk: &[PendingWrite], records: Vec<StoreRecord>, outcome: &mut WriteOutcome) {
        outcome.written.extend(
            chunk
                .iter()
                .map(|p| p.key.clone())
                .zip(records),
        );
    }

    fn record_failure(
        &self,
        op: WriteOp,
        chunk: &[PendingWrite],
        error: &PlatformError,
        outcome: &mut WriteOutcome,
    ) {
        let keys: Vec<String> = chunk.iter().map(|p| p.key.clone()).collect();
        tracing::error!(operation = op.as_str(), keys = ?keys, "Write failed: {}", error);
        emit(
            self.on_progress,
            SyncProgress::BatchFailed {
                operation: op.as_str(),
                keys: keys.clone(),
                error: short_error_message(error),
            },
        );
        outcome.failures.push(SyncFailure::new(
            FailureKind::BatchWrite,
            keys,
            format!("{} failed: {}", op.as_str(), error),
        ));
    }
}
