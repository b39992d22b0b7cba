//! Bounded exponential backoff shared by every completion call.
//!
//! The policy knows nothing about HTTP or providers: callers supply the
//! attempt itself and a predicate deciding which errors are worth retrying.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(2000);

/// Retry parameters. Defaults: 3 retries starting at 2s (2s, 4s, 8s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): `initial_delay * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Progress notification handed to the observer before each retry sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryNotice {
    pub attempt: u32,
    #[serde(serialize_with = "serialize_millis", rename = "delayMs")]
    pub delay: Duration,
    pub delay_seconds: u64,
}

impl RetryNotice {
    fn new(attempt: u32, delay: Duration) -> Self {
        Self {
            attempt,
            delay,
            delay_seconds: (delay.as_millis() as f64 / 1000.0).round() as u64,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(delay.as_millis() as u64)
}

/// Observer invoked before every retry. Has no effect on control flow.
pub type RetryObserver = Arc<dyn Fn(RetryNotice) + Send + Sync>;

/// Per-request hooks: progress observer and cooperative cancellation.
#[derive(Clone, Default)]
pub struct RetryHooks {
    pub observer: Option<RetryObserver>,
    pub cancel: Option<CancellationToken>,
}

impl RetryHooks {
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The last error seen: either non-retryable or retries were exhausted.
    Failed(E),
    Cancelled,
}

/// Attempt counter and current delay for one in-flight request.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    delay: Duration,
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or `policy.max_retries` retries have been spent.
pub async fn retry_with_backoff<T, E, Op, Fut, R>(
    policy: &RetryPolicy,
    hooks: &RetryHooks,
    is_retryable: R,
    mut operation: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut state = RetryState::default();

    loop {
        if hooks.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !is_retryable(&error) || state.attempt >= policy.max_retries {
            return Err(RetryError::Failed(error));
        }

        state.attempt += 1;
        state.delay = policy.delay_for(state.attempt);
        warn!(
            "Attempt {} rate limited ({}), retrying after {}ms",
            state.attempt,
            error,
            state.delay.as_millis()
        );

        if let Some(observer) = &hooks.observer {
            observer(RetryNotice::new(state.attempt, state.delay));
        }

        match &hooks.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(state.delay) => {}
                }
            }
            None => tokio::time::sleep(state.delay).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Busy,
        Broken,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn recording_hooks() -> (RetryHooks, Arc<Mutex<Vec<RetryNotice>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = RetryHooks::default()
            .with_observer(Arc::new(move |n: RetryNotice| sink.lock().unwrap().push(n)));
        (hooks, seen)
    }

    #[test]
    fn test_delay_doubles_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_notice_serializes_for_progress_display() {
        let json = serde_json::to_value(RetryNotice::new(2, Duration::from_millis(4000))).unwrap();
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["delayMs"], 4000);
        assert_eq!(json["delaySeconds"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_rate_limits_then_success() {
        let (hooks, seen) = recording_hooks();
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(
            &RetryPolicy::default(),
            &hooks,
            |e: &FakeError| *e == FakeError::Busy,
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(FakeError::Busy)
                } else {
                    Ok("done")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let seen = seen.lock().unwrap();
        let attempts: Vec<u32> = seen.iter().map(|n| n.attempt).collect();
        let delays: Vec<u128> = seen.iter().map(|n| n.delay.as_millis()).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(delays, vec![2000, 4000, 8000]);
        assert_eq!(started.elapsed(), Duration::from_millis(14_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_rate_limit_is_terminal() {
        let (hooks, seen) = recording_hooks();
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::default(),
            &hooks,
            |e: &FakeError| *e == FakeError::Busy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Busy)
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Failed(FakeError::Busy))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let (hooks, seen) = recording_hooks();
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::default(),
            &hooks,
            |e: &FakeError| *e == FakeError::Busy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Broken)
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Failed(FakeError::Broken))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_delay_policy_for_fast_tests() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::ZERO,
        };
        let calls = &AtomicU32::new(0);

        let result = retry_with_backoff(
            &policy,
            &RetryHooks::default(),
            |e: &FakeError| *e == FakeError::Busy,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FakeError::Busy)
                } else {
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let hooks = RetryHooks::default()
            .with_cancel(cancel)
            .with_observer(Arc::new(move |_: RetryNotice| trigger.cancel()));
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::default(),
            &hooks,
            |e: &FakeError| *e == FakeError::Busy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Busy)
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let hooks = RetryHooks::default().with_cancel(cancel);
        let calls = &AtomicU32::new(0);

        let result: Result<(), RetryError<FakeError>> = retry_with_backoff(
            &RetryPolicy::default(),
            &hooks,
            |_| true,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
