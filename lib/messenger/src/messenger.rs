//! The messenger factory.
//!
//! [`MessengerBuilder`] assembles a dispatch chain around a transport and an
//! execution policy; [`Messenger`] is the result. It dispatches requests
//! within a delivery context and hands out call builders bound to itself.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tower::Layer;

use crate::middleware::{
    HeadersLayer, LoggingLayer, PolicyLayer, RetryLayer, RetryOptions, TimeoutLayer,
};
use crate::{
    BoxDispatcher, Call, CallContext, Codec, DefaultValidator, DirectPolicy, DispatchFuture,
    Dispatcher, HyperTransport, Policy, RawCodec, Request, Response, Result, Transport,
    TransportAdapter, TransportConfig, Validator,
};

/// Type-erased layer application.
type LayerFn = Arc<dyn Fn(BoxDispatcher) -> BoxDispatcher + Send + Sync>;

/// Outbound HTTP messenger.
///
/// Cheap to clone; clones share the dispatch chain.
///
/// # Example
///
/// ```no_run
/// use messenger::{CallContext, Messenger};
///
/// # async fn run() -> messenger::Result<()> {
/// let messenger = Messenger::builder().with_logging().build();
///
/// let mut items: Vec<String> = Vec::new();
/// messenger
///     .call()
///     .get("http://example.com/items")
///     .json_response(&mut items)
///     .send(&CallContext::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Messenger {
    dispatcher: BoxDispatcher,
    codec: Arc<dyn Codec>,
    validator: Arc<dyn Validator>,
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger").finish_non_exhaustive()
    }
}

impl Messenger {
    /// Create a messenger with every default.
    #[must_use]
    pub fn new() -> Self {
        MessengerBuilder::default().build()
    }

    /// Create a messenger builder.
    #[must_use]
    pub fn builder() -> MessengerBuilder {
        MessengerBuilder::default()
    }

    /// The default codec of calls made through [`Messenger::call`].
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Dispatch `request` as one logical call.
    ///
    /// # Errors
    ///
    /// Returns whatever the dispatch chain fails with.
    pub async fn request(
        &self,
        cx: &CallContext,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>> {
        self.dispatch(cx, request).await
    }

    /// Start a call bound to this messenger, its codec and its validator.
    #[must_use]
    pub fn call<'a>(&self) -> Call<'a> {
        Call::new()
            .dispatcher(Arc::new(self.clone()))
            .shared_codec(Arc::clone(&self.codec))
            .shared_validator(Arc::clone(&self.validator))
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for Messenger {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        Box::pin(async move {
            let cx = cx.with_delivery(&request);
            self.dispatcher.dispatch(&cx, request).await
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Messenger`].
///
/// Layers wrap the base chain `PolicyDispatcher(TransportAdapter(transport))`
/// and are applied in order: first added = outermost (sees requests first).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use messenger::{JsonCodec, Messenger};
/// use messenger::middleware::RetryOptions;
///
/// let messenger = Messenger::builder()
///     .codec(JsonCodec)
///     .with_logging()
///     .with_retry(RetryOptions::default().maximum_attempts(2))
///     .with_timeout(Duration::from_secs(5))
///     .with_headers([("X-Client", "billing")])
///     .build();
/// # drop(messenger);
/// ```
#[derive(Default)]
pub struct MessengerBuilder {
    transport: Option<BoxDispatcher>,
    config: Option<TransportConfig>,
    policy: Option<Arc<dyn Policy>>,
    codec: Option<Arc<dyn Codec>>,
    validator: Option<Arc<dyn Validator>>,
    layers: Vec<LayerFn>,
}

impl std::fmt::Debug for MessengerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerBuilder")
            .field("custom_transport", &self.transport.is_some())
            .field("config", &self.config)
            .field("custom_policy", &self.policy.is_some())
            .field("layers_count", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl MessengerBuilder {
    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Use `transport` for network I/O instead of [`HyperTransport`].
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(TransportAdapter::new(transport)));
        self
    }

    /// Configure the default [`HyperTransport`]. Ignored when a custom
    /// transport is set.
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Run every dispatch under `policy` instead of [`DirectPolicy`].
    #[must_use]
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Default codec of calls made through [`Messenger::call`].
    #[must_use]
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Default validator of calls made through [`Messenger::call`].
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    // ========================================================================
    // Decorators
    // ========================================================================

    /// Add a decorator layer.
    ///
    /// Layers are applied in order: first added = outermost.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxDispatcher> + Send + Sync + 'static,
        L::Service: Dispatcher + 'static,
    {
        self.layers.push(Arc::new(move |inner| -> BoxDispatcher {
            Arc::new(layer.layer(inner))
        }));
        self
    }

    /// Set fixed headers on every request.
    #[must_use]
    pub fn with_headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.layer(HeadersLayer::new(headers))
    }

    /// Bound every dispatch by `timeout`.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.layer(TimeoutLayer::new(timeout))
    }

    /// Retry failed dispatches.
    #[must_use]
    pub fn with_retry(self, options: RetryOptions) -> Self {
        self.layer(RetryLayer::new(options))
    }

    /// Log requests and responses at info level.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Log requests and responses at debug level, headers included.
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug().with_headers())
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the messenger, filling omitted collaborators with defaults.
    #[must_use]
    pub fn build(self) -> Messenger {
        let transport = self.transport.unwrap_or_else(|| {
            let config = self.config.unwrap_or_default();
            Arc::new(TransportAdapter::new(HyperTransport::with_config(config)))
        });
        let policy = self.policy.unwrap_or_else(|| Arc::new(DirectPolicy));

        let mut dispatcher: BoxDispatcher =
            Arc::new(PolicyLayer::from_arc(policy).layer(transport));

        // First added = outermost, so wrap from the innermost out
        for layer_fn in self.layers.iter().rev() {
            dispatcher = layer_fn(dispatcher);
        }

        Messenger {
            dispatcher,
            codec: self.codec.unwrap_or_else(|| Arc::new(RawCodec)),
            validator: self.validator.unwrap_or_else(|| Arc::new(DefaultValidator)),
        }
    }
}
