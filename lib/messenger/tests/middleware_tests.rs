//! Decorator tests through the full messenger chain using wiremock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use messenger::middleware::{
    HeadersLayer, LoggingLayer, NonRetryable, RetryMetrics, RetryOptions, TimeoutLayer,
};
use messenger::{CallContext, ErrorKind, Messenger, MessengerBuilder};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Shared retry counters; clones observe the same values.
#[derive(Clone, Default)]
struct Counters {
    success: Arc<AtomicU32>,
    failure: Arc<AtomicU32>,
    attempts: Arc<AtomicU32>,
}

impl RetryMetrics for Counters {
    fn inc_success(&self) {
        self.success.fetch_add(1, Ordering::SeqCst);
    }

    fn inc_failure(&self) {
        self.failure.fetch_add(1, Ordering::SeqCst);
    }

    fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_retry() -> RetryOptions {
    RetryOptions::default()
        .initial_interval(Duration::from_millis(5))
        .maximum_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_headers_layer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(header("X-Client", "billing"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let messenger = Messenger::builder()
        .layer(HeadersLayer::bearer("secret-token"))
        .with_headers([("X-Client", "billing")])
        .build();

    messenger
        .call()
        .get(format!("{}/protected", mock_server.uri()))
        .header("authorization", "Bearer stale")
        .send(&CallContext::new())
        .await
        .expect("send");
}

#[tokio::test]
async fn test_retry_recovers_from_timeouts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let counters = Counters::default();
    let messenger = Messenger::builder()
        .with_retry(fast_retry().metrics(counters.clone()))
        .with_timeout(Duration::from_millis(100))
        .build();

    let reply = messenger
        .call()
        .get(mock_server.uri())
        .send(&CallContext::new())
        .await
        .expect("recovered");

    check!(reply.text().expect("utf-8") == "finally");
    check!(counters.attempts.load(Ordering::SeqCst) == 2);
    check!(counters.success.load(Ordering::SeqCst) == 1);
    check!(counters.failure.load(Ordering::SeqCst) == 0);
}

#[tokio::test]
async fn test_retry_gives_up_on_connection_errors() {
    let counters = Counters::default();
    let messenger = Messenger::builder()
        .with_retry(fast_retry().maximum_attempts(2).metrics(counters.clone()))
        .build();

    let err = messenger
        .call()
        .get("http://127.0.0.1:1/")
        .send(&CallContext::new())
        .await
        .expect_err("unreachable");

    check!(err.kind() == ErrorKind::Transport);
    check!(counters.attempts.load(Ordering::SeqCst) == 2);
    check!(counters.failure.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn test_retry_respects_non_retryable_kinds() {
    let counters = Counters::default();
    let messenger = Messenger::builder()
        .with_retry(
            fast_retry()
                .classifier(NonRetryable::new([ErrorKind::Transport]))
                .metrics(counters.clone()),
        )
        .build();

    let result = messenger
        .call()
        .get("http://127.0.0.1:1/")
        .send(&CallContext::new())
        .await;

    check!(result.is_err());
    check!(counters.attempts.load(Ordering::SeqCst) == 0);
}

#[tokio::test]
async fn test_http_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = Messenger::builder()
        .with_retry(fast_retry())
        .build()
        .call()
        .get(mock_server.uri())
        .send(&CallContext::new())
        .await
        .expect_err("rejected by validator");

    check!(err.status() == Some(503));
}

#[tokio::test]
async fn test_timeout_layer_deadline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let err = Messenger::builder()
        .layer(TimeoutLayer::new(Duration::from_millis(50)))
        .build()
        .call()
        .get(mock_server.uri())
        .send(&CallContext::new())
        .await
        .expect_err("deadline");

    check!(err.kind() == ErrorKind::DeadlineExceeded);
    check!(err.to_string() == "send request: context deadline exceeded");
}

// ============================================================================
// Logging
// ============================================================================

/// Captured event: message plus `name=value` fields.
#[derive(Debug, Default, Clone)]
struct Captured {
    fields: Vec<(String, String)>,
}

impl Captured {
    fn push(&mut self, field: &Field, value: String) {
        self.fields.push((field.name().to_string(), value));
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl Visit for Captured {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

#[derive(Clone, Default)]
struct Capture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Capture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut captured = Captured::default();
        event.record(&mut captured);
        self.events.lock().expect("lock").push(captured);
    }
}

impl Capture {
    fn actions(&self) -> Vec<Captured> {
        self.events
            .lock()
            .expect("lock")
            .iter()
            .filter(|event| event.get("action").is_some())
            .cloned()
            .collect()
    }
}

async fn logged_call(builder: MessengerBuilder, uri: String, body: &'static str) -> Capture {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    builder
        .build()
        .call()
        .post(uri)
        .raw(body)
        .send(&CallContext::new())
        .await
        .expect("send");

    capture
}

#[tokio::test]
async fn test_logging_request_and_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&mock_server)
        .await;

    let builder = Messenger::builder().layer(LoggingLayer::new().entity("orders"));
    let capture = logged_call(builder, format!("{}/orders", mock_server.uri()), "order-1").await;

    let events = capture.actions();
    let_assert!([request, response] = events.as_slice());

    check!(request.get("action") == Some("request"));
    check!(request.get("entity") == Some("orders"));
    check!(request.get("method") == Some("POST"));
    check!(request.get("data") == Some("order-1"));
    let subject = request.get("subject").unwrap_or_default();
    check!(subject.ends_with("/orders"));

    check!(response.get("action") == Some("response"));
    check!(response.get("status") == Some("200"));
    check!(response.get("data") == Some("accepted"));
    check!(response.get("duration_ms").is_some());
}

#[tokio::test]
async fn test_logging_once_outside_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let builder = Messenger::builder()
        .with_logging()
        .with_retry(fast_retry())
        .with_timeout(Duration::from_millis(100));
    let capture = logged_call(builder, mock_server.uri(), "x").await;

    let requests = capture
        .actions()
        .into_iter()
        .filter(|event| event.get("action") == Some("request"))
        .count();
    check!(requests == 1);
}

#[tokio::test]
async fn test_debug_logging_includes_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    // Logging sees the request as it stands at its own position in the chain
    let builder = Messenger::builder()
        .with_headers([("X-Trace", "abc")])
        .with_debug_logging()
        .with_headers([("X-Inner", "late")]);
    let capture = logged_call(builder, mock_server.uri(), "x").await;

    let events = capture.actions();
    let request = events.first().expect("request event");
    let headers = request.get("headers").expect("headers field");
    check!(headers.contains("X-Trace"));
    check!(!headers.contains("X-Inner"));

    let received = mock_server
        .received_requests()
        .await
        .expect("recording enabled");
    let_assert!([sent] = received.as_slice());
    check!(sent.headers.get("x-inner").is_some());
}
