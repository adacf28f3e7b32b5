//! Change detection: the watermark and the incremental query.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::SyncError;
use crate::platform::{RecordQuery, RecordStore};
use crate::retry::{RetryConfig, retry_platform};
use crate::sync::ProgressCallback;

use super::extract::parse_timestamp;

/// Format the tracker's query language accepts for date comparisons.
const JQL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Read the latest synced "updated" value from the store.
///
/// `Ok(None)` when the store is empty, no record carries a value, or no
/// field is mapped. A read that still fails after retries is fatal.
pub(crate) async fn latest_watermark<R: RecordStore + ?Sized>(
    store: &R,
    updated_field_id: Option<&str>,
    retry: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<Option<DateTime<Utc>>, SyncError> {
    let Some(field_id) = updated_field_id else {
        tracing::info!("No 'updated' field mapped, syncing every matching issue");
        return Ok(None);
    };

    let query = RecordQuery::latest_by(field_id);
    let records = retry_platform(
        || store.list_records(&query),
        "read watermark",
        retry,
        on_progress,
    )
    .await
    .map_err(SyncError::Watermark)?;

    let Some(value) = records.first().and_then(|r| r.fields.get(field_id)) else {
        return Ok(None);
    };

    parse_watermark(value).map(Some)
}

/// Interpret a stored "updated" value as a UTC instant.
pub(crate) fn parse_watermark(value: &Value) -> Result<DateTime<Utc>, SyncError> {
    let invalid = || SyncError::InvalidWatermark {
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };

    let raw = value.as_str().ok_or_else(invalid)?;
    if let Some(dt) = parse_timestamp(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(invalid)
}

/// Resolve an IANA timezone name, falling back to UTC.
pub(crate) fn resolve_timezone(name: Option<&str>) -> Tz {
    match name {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = name, "Unknown tracker timezone, using UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}

/// Render the watermark as the tracker expects it: minute precision, in
/// the tracker user's own timezone.
pub(crate) fn format_watermark(watermark: DateTime<Utc>, tz: Tz) -> String {
    watermark.with_timezone(&tz).format(JQL_DATE_FORMAT).to_string()
}

/// Compose the search query.
///
/// `(base) AND updated > "watermark" AND (extra) ORDER BY key ASC`, with
/// absent parts left out.
pub(crate) fn build_jql(base: &str, watermark: Option<&str>, extra: Option<&str>) -> String {
    let mut clauses = Vec::new();
    if !base.trim().is_empty() {
        clauses.push(format!("({})", base.trim()));
    }
    if let Some(watermark) = watermark {
        clauses.push(format!("updated > \"{watermark}\""));
    }
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        clauses.push(format!("({extra})"));
    }

    if clauses.is_empty() {
        "ORDER BY key ASC".to_string()
    } else {
        format!("{} ORDER BY key ASC", clauses.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parse_watermark_accepts_store_and_tracker_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(
            parse_watermark(&json!("2024-01-02T10:00:00.000Z")).unwrap(),
            expected
        );
        assert_eq!(
            parse_watermark(&json!("2024-01-02T11:00:00.000+0100")).unwrap(),
            expected
        );
        assert_eq!(
            parse_watermark(&json!("2024-01-02")).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn parse_watermark_rejects_garbage() {
        assert!(matches!(
            parse_watermark(&json!("last tuesday")),
            Err(SyncError::InvalidWatermark { value }) if value == "last tuesday"
        ));
        assert!(matches!(
            parse_watermark(&json!(42)),
            Err(SyncError::InvalidWatermark { value }) if value == "42"
        ));
    }

    #[test]
    fn format_watermark_converts_to_tracker_timezone() {
        let watermark = Utc.with_ymd_and_hms(2024, 1, 2, 10, 5, 59).unwrap();
        assert_eq!(format_watermark(watermark, Tz::UTC), "2024-01-02 10:05");

        let berlin = resolve_timezone(Some("Europe/Berlin"));
        assert_eq!(format_watermark(watermark, berlin), "2024-01-02 11:05");
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone(Some("Mars/Olympus")), Tz::UTC);
        assert_eq!(resolve_timezone(None), Tz::UTC);
    }

    #[test]
    fn build_jql_composes_clauses() {
        assert_eq!(
            build_jql("project = A", None, None),
            "(project = A) ORDER BY key ASC"
        );
        assert_eq!(
            build_jql("project = A", Some("2024-01-02 10:05"), Some("labels = sync")),
            "(project = A) AND updated > \"2024-01-02 10:05\" AND (labels = sync) ORDER BY key ASC"
        );
        assert_eq!(build_jql("", None, Some("  ")), "ORDER BY key ASC");
    }
}
