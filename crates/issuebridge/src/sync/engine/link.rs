//! Second pass: writing parent links.
//!
//! Parents created in this run did not exist when the first lookup ran, so
//! every child and parent key is looked up again after all writes. Links are
//! built by key, never by holding on to records from the first pass.

use std::collections::BTreeSet;

use serde_json::json;

use crate::platform::RecordStore;
use crate::record::Fields;
use crate::sync::{FailureKind, SyncFailure, SyncProgress, emit};

use super::matcher::RecordMatcher;
use super::writer::{BatchWriter, WriteOutcome};

/// Outcome of the linking pass.
#[derive(Debug, Default)]
pub(crate) struct LinkOutcome {
    pub linked: usize,
    pub failures: Vec<SyncFailure>,
    pub options_added: usize,
}

/// Write `parent_field_id` on every child in `links` (`(child, parent)` keys).
pub(crate) async fn link_parents<R: RecordStore + ?Sized>(
    links: &[(String, String)],
    parent_field_id: &str,
    matcher: &RecordMatcher<'_, R>,
    writer: &BatchWriter<'_, R>,
) -> LinkOutcome {
    let mut outcome = LinkOutcome::default();
    if links.is_empty() {
        return outcome;
    }

    tracing::info!(count = links.len(), "Linking child issues to parents");
    emit(writer.on_progress, SyncProgress::Linking { count: links.len() });

    let keys: Vec<String> = links
        .iter()
        .flat_map(|(child, parent)| [child.clone(), parent.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let resolved = matcher.match_existing(&keys).await;
    let lookup_failed: BTreeSet<&str> = resolved.failed_keys().collect();

    let mut updates: Vec<(String, String, Fields)> = Vec::new();
    for (child, parent) in links {
        match (resolved.ids.get(child), resolved.ids.get(parent)) {
            (Some(child_id), Some(parent_id)) => {
                let mut fields = Fields::new();
                fields.insert(parent_field_id.to_string(), json!([parent_id]));
                updates.push((child.clone(), child_id.clone(), fields));
            }
            (child_id, parent_id) => {
                let side = |key: &str, id: Option<&String>| {
                    if lookup_failed.contains(key) {
                        Some(format!("lookup of {key} failed"))
                    } else if id.is_none() {
                        Some(format!("{key} not found"))
                    } else {
                        None
                    }
                };
                let reason = [side(child, child_id), side(parent, parent_id)]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ");

                tracing::warn!(child = %child, parent = %parent, "Skipping parent link: {}", reason);
                emit(
                    writer.on_progress,
                    SyncProgress::LinkSkipped {
                        child: child.clone(),
                        parent: parent.clone(),
                        reason: reason.clone(),
                    },
                );
                outcome.failures.push(SyncFailure::new(
                    FailureKind::UnresolvedLink,
                    vec![child.clone()],
                    format!("parent {parent}: {reason}"),
                ));
            }
        }
    }

    let WriteOutcome {
        written,
        failures,
        options_added,
    } = writer.update_batch(updates).await;

    outcome.linked = written.len();
    outcome.failures.extend(failures);
    outcome.options_added = options_added;
    outcome
}

