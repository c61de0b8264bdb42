//! Retry metrics backed by the `metrics` crate facade.
//!
//! Outcomes go to whatever recorder the application installed (Prometheus,
//! `StatsD`, ...). Without a recorder they are dropped.

use std::borrow::Cow;

use super::RetryMetrics;

const LABEL_NAME: &str = "name";

/// Metric names.
const METRIC_SUCCESS_TOTAL: &str = "messenger_retry_success_total";
const METRIC_FAILURE_TOTAL: &str = "messenger_retry_failure_total";
const METRIC_ATTEMPTS_TOTAL: &str = "messenger_retry_attempts_total";

/// [`RetryMetrics`] sink recording counters.
///
/// Records the following counters, labeled by `name`:
/// - `messenger_retry_success_total`: calls that finally succeeded
/// - `messenger_retry_failure_total`: calls that finally failed
/// - `messenger_retry_attempts_total`: retries performed
///
/// # Example
///
/// ```
/// use messenger::middleware::{CounterMetrics, RetryOptions};
///
/// let options = RetryOptions::default().metrics(CounterMetrics::new("billing"));
/// assert!(options.metrics.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CounterMetrics {
    name: Cow<'static, str>,
}

impl CounterMetrics {
    /// Create a sink labeling every counter with `name`.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// The `name` label value.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for CounterMetrics {
    fn default() -> Self {
        Self::new("default")
    }
}

impl RetryMetrics for CounterMetrics {
    fn inc_success(&self) {
        metrics::counter!(METRIC_SUCCESS_TOTAL, LABEL_NAME => self.name.clone()).increment(1);
    }

    fn inc_failure(&self) {
        metrics::counter!(METRIC_FAILURE_TOTAL, LABEL_NAME => self.name.clone()).increment(1);
    }

    fn inc_attempts(&self) {
        metrics::counter!(METRIC_ATTEMPTS_TOTAL, LABEL_NAME => self.name.clone()).increment(1);
    }
}
