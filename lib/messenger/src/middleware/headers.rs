//! Header injection decorator.
//!
//! Sets a fixed set of headers on every outgoing request, overwriting any
//! value already present under the same (case-insensitive) name.

use std::sync::Arc;

use bytes::Bytes;
use tower::Layer;

use crate::{CallContext, DispatchFuture, Dispatcher, Request};

/// Layer that injects headers into requests.
///
/// # Example
///
/// ```
/// use messenger::middleware::HeadersLayer;
///
/// let layer = HeadersLayer::new([("X-Api-Key", "secret")])
///     .header("X-Client", "billing");
/// assert_eq!(layer.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeadersLayer {
    headers: Arc<[(String, String)]>,
}

impl HeadersLayer {
    /// Create a layer injecting `headers`.
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Layer adding an `Authorization: Bearer <token>` header.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::new([("Authorization", format!("Bearer {}", token.as_ref()))])
    }

    /// Add one more header.
    #[must_use]
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.to_vec();
        headers.push((name.into(), value.into()));
        Self {
            headers: headers.into(),
        }
    }

    /// Number of configured headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` if no header is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<D> Layer<D> for HeadersLayer {
    type Service = Headers<D>;

    fn layer(&self, inner: D) -> Self::Service {
        Headers {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// Dispatcher that injects headers into requests.
#[derive(Debug, Clone)]
pub struct Headers<D> {
    inner: D,
    headers: Arc<[(String, String)]>,
}

impl<D: Dispatcher> Dispatcher for Headers<D> {
    fn dispatch<'a>(
        &'a self,
        cx: &'a CallContext,
        mut request: Request<Bytes>,
    ) -> DispatchFuture<'a> {
        let delivery = cx.delivery();
        for (name, value) in self.headers.iter() {
            request.set_header(name.as_str(), value.as_str());
            if let Some(delivery) = delivery {
                delivery.set_header(name.as_str(), value.as_str());
            }
        }
        self.inner.dispatch(cx, request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert2::{check, let_assert};

    use super::*;
    use crate::{Method, Response};

    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<Request>>,
    }

    impl Dispatcher for Capture {
        fn dispatch<'a>(&'a self, _cx: &'a CallContext, request: Request) -> DispatchFuture<'a> {
            self.seen.lock().expect("lock").push(request);
            Box::pin(async { Ok(Response::new(200, HashMap::new(), Bytes::new())) })
        }
    }

    #[tokio::test]
    async fn configured_headers_overwrite_existing() {
        let url = url::Url::parse("http://example.com").expect("valid url");
        let request = Request::builder(Method::Get, url)
            .header("x-api-key", "old")
            .header("Accept", "text/plain")
            .build();

        let headers = HeadersLayer::new([("X-Api-Key", "new")]).layer(Capture::default());
        headers
            .dispatch(&CallContext::new(), request)
            .await
            .expect("dispatch");

        let seen = headers.inner.seen.lock().expect("lock");
        let sent = seen.first().expect("one request");
        check!(sent.header("X-API-KEY") == Some("new"));
        check!(sent.header("accept") == Some("text/plain"));
        check!(sent.headers().len() == 2);
    }

    #[tokio::test]
    async fn injected_headers_reach_the_delivery() {
        let url = url::Url::parse("http://example.com").expect("valid url");
        let request = Request::builder(Method::Get, url)
            .header("x-api-key", "old")
            .build();
        let cx = CallContext::new().with_delivery(&request);

        let layer = HeadersLayer::new([("X-Api-Key", "new"), ("X-Trace", "abc")]);
        let headers = layer.layer(Capture::default());
        headers.dispatch(&cx, request).await.expect("dispatch");

        let delivered = cx.delivery().expect("delivery").request();
        check!(delivered.header("x-api-key") == Some("new"));
        check!(delivered.header("x-trace") == Some("abc"));
        check!(delivered.headers().len() == 2);
    }

    #[test]
    fn bearer_helper() {
        let layer = HeadersLayer::bearer("t0k3n");
        let_assert!(Some((name, value)) = layer.headers.first());
        check!(name == "Authorization");
        check!(value == "Bearer t0k3n");
        check!(!layer.is_empty());
    }
}
