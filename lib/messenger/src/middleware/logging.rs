//! Request/response logging decorator.
//!
//! Logs one `request` event before delegating and one `response` event after,
//! using the `tracing` crate. Logging needs the call's delivery context to
//! attribute the response; without one the decorator passes through silently.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tower::Layer;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::{CallContext, DispatchFuture, Dispatcher, Method, Request, Response, drain};

/// Log level for the logging decorator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level.
    Debug,
    /// Log at info level.
    #[default]
    Info,
}

/// Emit an event at a runtime-selected [`LogLevel`].
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Debug => debug!($($arg)+),
            LogLevel::Info => info!($($arg)+),
        }
    };
}

/// Layer that adds request/response logging.
///
/// # Example
///
/// ```
/// use messenger::middleware::{LogLevel, LoggingLayer};
///
/// let layer = LoggingLayer::new().entity("billing").with_headers();
/// assert_eq!(layer.level(), LogLevel::Info);
/// ```
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    level: LogLevel,
    entity: Arc<str>,
    headers: bool,
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            entity: Arc::from("http"),
            headers: false,
        }
    }
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
            ..Self::default()
        }
    }

    /// Name the remote party in every event (`entity` field).
    #[must_use]
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Arc::from(entity.into());
        self
    }

    /// Include request headers in the `request` event.
    #[must_use]
    pub const fn with_headers(mut self) -> Self {
        self.headers = true;
        self
    }

    /// The configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<D> Layer<D> for LoggingLayer {
    type Service = Logging<D>;

    fn layer(&self, inner: D) -> Self::Service {
        Logging {
            inner,
            level: self.level,
            entity: Arc::clone(&self.entity),
            headers: self.headers,
        }
    }
}

/// Dispatcher that logs requests and responses.
#[derive(Debug, Clone)]
pub struct Logging<D> {
    inner: D,
    level: LogLevel,
    entity: Arc<str>,
    headers: bool,
}

impl<D> Logging<D> {
    fn log_request(&self, request: &Request<Bytes>) {
        let method = request.method();
        let data = request
            .body()
            .map(|body| drain(body.clone()).to_text())
            .unwrap_or_default();
        let headers = self.headers.then(|| format!("{:?}", request.headers()));

        log_at!(
            self.level,
            entity = %self.entity,
            action = "request",
            %method,
            subject = %request.url(),
            data = %data,
            headers = headers.as_deref(),
            "sending request"
        );
    }

    fn log_response(&self, method: Method, response: &Response<Bytes>, elapsed_ms: u64) {
        let data = if method.logs_response_body() {
            drain(response.body().clone()).to_text()
        } else {
            String::new()
        };

        log_at!(
            self.level,
            entity = %self.entity,
            action = "response",
            %method,
            status = response.status(),
            duration_ms = elapsed_ms,
            data = %data,
            "response received"
        );
    }
}

impl<D: Dispatcher> Dispatcher for Logging<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        let Some(delivery) = cx.delivery() else {
            return self.inner.dispatch(cx, request);
        };

        let method = request.method();
        let span = span!(Level::INFO, "http_request", %method, url = %request.url());

        Box::pin(
            async move {
                self.log_request(&request);
                let start = Instant::now();

                let result = self.inner.dispatch(cx, request).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => self.log_response(method, response, elapsed_ms),
                    Err(err) => {
                        if let Some(response) = delivery.response() {
                            self.log_response(method, &response, elapsed_ms);
                        }
                        warn!(
                            entity = %self.entity,
                            %method,
                            error = %err,
                            duration_ms = elapsed_ms,
                            "request failed"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
