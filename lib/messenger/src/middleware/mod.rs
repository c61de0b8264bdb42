//! Dispatch decorators.
//!
//! Every decorator is a [`tower::Layer`] wrapping an inner [`Dispatcher`]
//! and producing another one. Layers compose in the order they are applied:
//! the last layer applied is the first to see a request.
//!
//! # Available Layers
//!
//! - [`HeadersLayer`] - Sets fixed headers, overwriting existing values
//! - [`TimeoutLayer`] - Bounds each dispatch by a duration
//! - [`RetryLayer`] - Retries failures with capped exponential backoff
//! - [`LoggingLayer`] - Logs requests/responses using `tracing`
//! - [`PolicyLayer`] - Runs the inner dispatcher under an execution [`Policy`]
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `middleware-metrics` | [`CounterMetrics`] retry sink on the `metrics` facade |
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use messenger::middleware::{HeadersLayer, LoggingLayer, RetryLayer, RetryOptions, TimeoutLayer};
//! use messenger::{Dispatcher, HyperTransport, TransportAdapter};
//! use tower::ServiceBuilder;
//!
//! let dispatcher = ServiceBuilder::new()
//!     .layer(LoggingLayer::new())
//!     .layer(RetryLayer::new(RetryOptions::default()))
//!     .layer(TimeoutLayer::new(Duration::from_secs(5)))
//!     .layer(HeadersLayer::bearer("token"))
//!     .service(TransportAdapter::new(HyperTransport::new()));
//! # fn is_dispatcher(_: &impl Dispatcher) {}
//! # is_dispatcher(&dispatcher);
//! ```
//!
//! [`Dispatcher`]: crate::Dispatcher
//! [`Policy`]: crate::Policy

mod headers;
mod logging;
#[cfg(feature = "middleware-metrics")]
mod metrics;
mod policy;
mod retry;
mod timeout;

pub use headers::{Headers, HeadersLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};
#[cfg(feature = "middleware-metrics")]
pub use metrics::CounterMetrics;
pub use policy::{PolicyDispatcher, PolicyLayer};
pub use retry::{
    AllRetryable, NonRetryable, Retry, RetryClassifier, RetryLayer, RetryMetrics, RetryOptions,
    next_interval,
};
pub use timeout::{Timeout, TimeoutLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
