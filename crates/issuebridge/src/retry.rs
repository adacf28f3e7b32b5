//! Retry with exponential backoff for every remote call.
//!
//! The engine wraps each network operation (watermark read, page fetch,
//! lookup, write, schema patch) in [`with_retry`]. Only errors the caller
//! classifies as retryable are retried; the delay before retry `n` is
//! `min_delay * 2^n`, capped at `max_delay`. An error that says when the
//! remote will accept requests again stretches the delay to that point.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::platform::{PlatformError, short_error_message};
use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, ProgressCallback, SyncProgress, emit,
};

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts after the first call.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RETRIES,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: false,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0)
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Execute an operation, retrying retryable failures with exponential backoff.
///
/// - Tracks attempts with an atomic counter
/// - Waits at least `min_wait(err)` when it returns a duration
/// - Reports each backoff via the progress callback
/// - Logs each backoff at debug level
///
/// Returns the first success, the first non-retryable error, or the last
/// error once `config.max_retries` retries are exhausted.
///
/// # Example
///
/// ```ignore
/// use issuebridge::retry::{RetryConfig, with_retry};
/// use issuebridge::platform::{PlatformError, short_error_message};
///
/// let records = with_retry(
///     || store.list_records(&query),
///     PlatformError::is_transient,
///     PlatformError::rate_limit_wait,
///     |e: &PlatformError| short_error_message(e),
///     "list records",
///     &RetryConfig::default(),
///     None,
/// ).await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable, MinWait, ShortMsg>(
    mut operation: F,
    is_retryable: IsRetryable,
    min_wait: MinWait,
    short_message: ShortMsg,
    label: &str,
    config: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
    MinWait: Fn(&E) -> Option<Duration>,
    ShortMsg: Fn(&E) -> String + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .adjust(|err, dur| dur.map(|d| min_wait(err).map_or(d, |wait| d.max(wait))))
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                SyncProgress::RetryBackoff {
                    operation: label.to_string(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                },
            );
            tracing::debug!(
                operation = label,
                attempt = current_attempt,
                "Retrying in {:?}: {}",
                dur,
                short_message(err)
            );
        })
        .when(is_retryable)
        .await
}

/// [`with_retry`] specialised for remote calls returning [`PlatformError`].
///
/// Retries transient errors only (rate limits, network, 5xx). A rate limit
/// is waited out until its reset time.
pub async fn retry_platform<T, F, Fut>(
    operation: F,
    label: &str,
    config: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    with_retry(
        operation,
        PlatformError::is_transient,
        PlatformError::rate_limit_wait,
        |e: &PlatformError| short_error_message(e),
        label,
        config,
        on_progress,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.min_delay, Duration::from_millis(INITIAL_BACKOFF_MS));
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(config.max_retries, MAX_RETRIES);
        assert!(!config.with_jitter);
    }

    #[test]
    fn test_retry_config_custom() {
        let config = RetryConfig::new(Duration::from_secs(2), Duration::from_secs(30), 5)
            .with_jitter(true);

        assert_eq!(config.min_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert!(config.with_jitter);
    }

    #[test]
    fn test_retry_config_none() {
        assert_eq!(RetryConfig::none().max_retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_and_emits_progress() {
        let calls = Arc::new(AtomicU32::new(0));

        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            events_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        // Fail twice with a network error, then succeed.
        let calls_capture = Arc::clone(&calls);
        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                let n = calls_capture.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PlatformError::network("connection reset"))
                } else {
                    Ok(42u32)
                }
            }
        };

        let result =
            retry_platform(operation, "fetch page", &RetryConfig::default(), Some(&callback))
                .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        let delays: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SyncProgress::RetryBackoff { retry_after_ms, .. } => Some(*retry_after_ms),
                _ => None,
            })
            .collect();
        assert_eq!(delays, vec![1_000, 2_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries_with_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlatformError::api(503, "unavailable"))
            }
        };

        let err = retry_platform(operation, "list records", &RetryConfig::default(), None)
            .await
            .expect_err("expected exhaustion");

        assert_eq!(err, PlatformError::api(503, "unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 1 + MAX_RETRIES as u32);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_rate_limit_reset_before_retrying() {
        let calls = Arc::new(AtomicU32::new(0));

        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            events_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        // Locked out for 30 seconds on the first call, fine afterwards.
        let calls_capture = Arc::clone(&calls);
        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                if calls_capture.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PlatformError::RateLimited {
                        reset_at: chrono::Utc::now() + chrono::Duration::seconds(30),
                    })
                } else {
                    Ok("records")
                }
            }
        };

        let start = tokio::time::Instant::now();
        let result =
            retry_platform(operation, "list records", &RetryConfig::default(), Some(&callback))
                .await;

        assert_eq!(result.unwrap(), "records");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(29));

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        match events.as_slice() {
            [SyncProgress::RetryBackoff { retry_after_ms, .. }] => {
                assert!(*retry_after_ms >= 29_000, "waited {retry_after_ms}ms");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let operation = move || {
            let calls_capture = Arc::clone(&calls_capture);
            async move {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlatformError::api(422, "invalid"))
            }
        };

        let err = retry_platform(operation, "create", &RetryConfig::default(), None)
            .await
            .expect_err("expected error");

        assert_eq!(err.to_string(), "API error (422): invalid");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
