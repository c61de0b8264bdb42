//! Transport implementation using hyper-util, and the adapter that puts any
//! [`Transport`] at the bottom of a dispatch chain.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::Layer;
use tracing::debug;

use crate::{
    CallContext, DispatchFuture, Dispatcher, Error, Request, Response, Result, Transport,
    config::TransportConfig, connector::https_connector,
};

// ============================================================================
// Hyper Transport
// ============================================================================

/// HTTP transport using hyper-util with rustls.
///
/// Cloning is cheap; clones share the underlying client.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: TransportConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        let connector = https_connector(config.connect_timeout);
        let inner = Client::builder(TokioExecutor::new()).build(connector);
        Self { inner, config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Build a hyper request from a wire request.
    fn build_hyper_request(request: Request<Bytes>) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = body.map_or_else(Full::default, Full::new);
        builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Extract response headers as a `HashMap`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    async fn exchange(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let hyper_request = Self::build_hyper_request(request)?;

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let response_headers = Self::extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::read(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, response_headers, body))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.exchange(request))
            .await
            .map_err(|_| Error::connection(format!("no response within {timeout:?}")))?
    }
}

// ============================================================================
// Transport Adapter
// ============================================================================

/// Layer that puts a [`Transport`] under a dispatcher. Exists so the adapter
/// composes like every other link.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportAdapterLayer;

impl<T> Layer<T> for TransportAdapterLayer {
    type Service = TransportAdapter<T>;

    fn layer(&self, transport: T) -> Self::Service {
        TransportAdapter::new(transport)
    }
}

/// Innermost dispatcher: hands the request to the transport.
///
/// The exchange is abandoned as soon as the call context ends, and a
/// successful response is recorded in the delivery context.
#[derive(Debug, Clone)]
pub struct TransportAdapter<T> {
    transport: T,
}

impl<T> TransportAdapter<T> {
    /// Wrap a transport.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> Dispatcher for TransportAdapter<T> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        Box::pin(async move {
            if let Some(err) = cx.err() {
                return Err(err);
            }

            let response = tokio::select! {
                biased;
                err = cx.done() => {
                    debug!(error = %err, "call ended before the transport answered");
                    return Err(err);
                }
                result = self.transport.send(request) => result?,
            };

            if let Some(delivery) = cx.delivery() {
                delivery.set_response(response.clone());
            }
            Ok(response)
        })
    }
}
