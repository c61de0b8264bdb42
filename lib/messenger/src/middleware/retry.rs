//! Retry decorator with capped exponential backoff.
//!
//! One call runs as follows:
//!
//! 1. Dispatch once. A success is recorded and returned.
//! 2. A negative `maximum_attempts` disables retrying: the failure is
//!    recorded and returned.
//! 3. Otherwise retry while the classifier accepts the last error and the
//!    attempt budget is not spent (`0` means unlimited). Before each retry the
//!    interval grows by `backoff_coefficient`, clamped to `maximum_interval`,
//!    and the decorator sleeps that long. A call context that ends during the
//!    sleep aborts the loop with the context's error.
//!
//! Every dispatch after the first counts as an attempt, so the inner
//! dispatcher runs at most `maximum_attempts + 1` times.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tower::Layer;
use tracing::{debug, warn};

use crate::{CallContext, DispatchFuture, Dispatcher, Error, ErrorKind, Request, Response, Result};

// ============================================================================
// Classification
// ============================================================================

/// Decides whether a failed dispatch may be retried.
pub trait RetryClassifier: Send + Sync {
    /// Returns `true` if `error` is worth another attempt.
    fn is_retryable(&self, error: &Error) -> bool;
}

impl<F> RetryClassifier for F
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &Error) -> bool {
        self(error)
    }
}

/// Treats every error as retryable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllRetryable;

impl RetryClassifier for AllRetryable {
    fn is_retryable(&self, _error: &Error) -> bool {
        true
    }
}

/// Treats errors of the listed kinds as terminal and everything else as
/// retryable.
#[derive(Debug, Clone, Default)]
pub struct NonRetryable {
    kinds: Vec<ErrorKind>,
}

impl NonRetryable {
    /// Create a classifier stopping on the given kinds.
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl RetryClassifier for NonRetryable {
    fn is_retryable(&self, error: &Error) -> bool {
        !self.kinds.contains(&error.kind())
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Sink for retry outcomes.
pub trait RetryMetrics: Send + Sync {
    /// A call finally succeeded.
    fn inc_success(&self);
    /// A call finally failed.
    fn inc_failure(&self);
    /// One more attempt was made after a failure.
    fn inc_attempts(&self);
}

// ============================================================================
// Options
// ============================================================================

/// Retry configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use messenger::ErrorKind;
/// use messenger::middleware::{NonRetryable, RetryOptions};
///
/// let options = RetryOptions::default()
///     .initial_interval(Duration::from_millis(50))
///     .maximum_attempts(5)
///     .classifier(NonRetryable::new([ErrorKind::Validation]));
/// assert_eq!(options.maximum_attempts, 5);
/// ```
#[derive(Clone)]
pub struct RetryOptions {
    /// Interval the backoff grows from.
    pub initial_interval: Duration,
    /// Growth factor applied before each retry.
    pub backoff_coefficient: f64,
    /// Upper bound of the interval.
    pub maximum_interval: Duration,
    /// Retry budget. `0` is unlimited, negative disables retrying.
    pub maximum_attempts: i32,
    /// Error classifier; `None` retries every error.
    pub classifier: Option<Arc<dyn RetryClassifier>>,
    /// Outcome sink; `None` records nothing.
    pub metrics: Option<Arc<dyn RetryMetrics>>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(10),
            maximum_attempts: 3,
            classifier: None,
            metrics: None,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("initial_interval", &self.initial_interval)
            .field("backoff_coefficient", &self.backoff_coefficient)
            .field("maximum_interval", &self.maximum_interval)
            .field("maximum_attempts", &self.maximum_attempts)
            .field("classifier", &self.classifier.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl RetryOptions {
    /// Set the initial interval.
    #[must_use]
    pub const fn initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the backoff coefficient.
    #[must_use]
    pub const fn backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Set the maximum interval.
    #[must_use]
    pub const fn maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval = interval;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn maximum_attempts(mut self, attempts: i32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    /// Set the error classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: impl RetryClassifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Set the metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: impl RetryMetrics + 'static) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }

    fn is_retryable(&self, error: &Error) -> bool {
        self.classifier
            .as_ref()
            .is_none_or(|classifier| classifier.is_retryable(error))
    }

    fn record_success(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_success();
        }
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_failure();
        }
    }

    fn record_attempt(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_attempts();
        }
    }
}

/// Grow `current` by `coefficient`, clamped to `maximum`.
///
/// Products that are not finite, negative, or above `maximum` yield
/// `maximum`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn next_interval(current: Duration, coefficient: f64, maximum: Duration) -> Duration {
    let next = coefficient * current.as_nanos() as f64;
    if !next.is_finite() || next < 0.0 || next > maximum.as_nanos() as f64 {
        return maximum;
    }
    Duration::from_nanos(next as u64)
}

// ============================================================================
// State
// ============================================================================

/// Per-call retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryState {
    interval: Duration,
    attempts: i32,
}

impl RetryState {
    const fn new(initial_interval: Duration) -> Self {
        Self {
            interval: initial_interval,
            attempts: 0,
        }
    }

    /// Check whether `error` allows another attempt and, if so, advance the
    /// interval to the wait preceding it.
    fn can_attempt(&mut self, options: &RetryOptions, error: &Error) -> bool {
        if !options.is_retryable(error) {
            debug!(error = %error, "error is not retryable");
            return false;
        }

        if options.maximum_attempts != 0 && self.attempts >= options.maximum_attempts {
            warn!(attempts = self.attempts, error = %error, "retry budget exhausted");
            return false;
        }

        self.interval = next_interval(
            self.interval,
            options.backoff_coefficient,
            options.maximum_interval,
        );
        true
    }
}

// ============================================================================
// Decorator
// ============================================================================

/// Layer that retries failed dispatches.
///
/// # Example
///
/// ```
/// use messenger::middleware::{RetryLayer, RetryOptions};
///
/// let layer = RetryLayer::new(RetryOptions::default().maximum_attempts(2));
/// assert_eq!(layer.options().maximum_attempts, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    options: Arc<RetryOptions>,
}

impl RetryLayer {
    /// Create a retry layer.
    #[must_use]
    pub fn new(options: RetryOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// The retry configuration.
    #[must_use]
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }
}

impl<D> Layer<D> for RetryLayer {
    type Service = Retry<D>;

    fn layer(&self, inner: D) -> Self::Service {
        Retry {
            inner,
            options: Arc::clone(&self.options),
        }
    }
}

/// Dispatcher that retries failed dispatches with backoff.
#[derive(Debug, Clone)]
pub struct Retry<D> {
    inner: D,
    options: Arc<RetryOptions>,
}

impl<D: Dispatcher> Retry<D> {
    async fn retry(
        &self,
        cx: &CallContext,
        request: &Request<Bytes>,
        mut error: Error,
    ) -> Result<Response<Bytes>> {
        let mut state = RetryState::new(self.options.initial_interval);

        while state.can_attempt(&self.options, &error) {
            debug!(
                attempt = state.attempts + 1,
                interval = ?state.interval,
                error = %error,
                "retrying request"
            );

            tokio::select! {
                biased;
                err = cx.done() => return Err(err),
                () = tokio::time::sleep(state.interval) => {}
            }

            state.attempts += 1;
            self.options.record_attempt();

            match self.inner.dispatch(cx, request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => error = err,
            }
        }

        Err(error)
    }
}

impl<D: Dispatcher> Dispatcher for Retry<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        Box::pin(async move {
            let error = match self.inner.dispatch(cx, request.clone()).await {
                Ok(response) => {
                    self.options.record_success();
                    return Ok(response);
                }
                Err(err) => err,
            };

            if self.options.maximum_attempts < 0 {
                self.options.record_failure();
                return Err(error);
            }

            let result = self.retry(cx, &request, error).await;
            if result.is_ok() {
                self.options.record_success();
            } else {
                self.options.record_failure();
            }
            result
        })
    }
}
