//! Fluent request builder and its send pipeline.
//!
//! A [`Call`] collects the target, parameters, headers, body and response
//! bindings of one logical call. [`Call::send`] consumes it:
//!
//! 1. check the URL, the dispatcher, and the body of methods that need one
//! 2. encode the body (an absent body encodes to the codec's empty payload)
//! 3. build the wire request: query parameters, explicit headers, then the
//!    codec's implied headers on top
//! 4. dispatch within a delivery context
//! 5. drain the response body, decompressing gzip framing
//! 6. validate status and body
//! 7. run the handler registered for the status, or decode a `200` into the
//!    response binding

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::{
    BoxDispatcher, CallContext, Codec, Decoder, DefaultValidator, Encoder, Error, Field, JsonCodec,
    Method, RawCodec, Request, Result, Validator, drain, get_header, set_header,
};

// ============================================================================
// Bindings
// ============================================================================

/// A request payload paired with the codec that encodes it.
pub trait BodyBinding: Send {
    /// Encode the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the value cannot be encoded.
    fn encode(&self) -> Result<Bytes>;

    /// Headers implied by the encoding.
    fn headers(&self) -> &'static [(&'static str, &'static str)];
}

/// A response target paired with the codec that decodes into it.
pub trait ResponseBinding: Send {
    /// Decode `data` into the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when `data` does not fit the target.
    fn decode(&mut self, data: &[u8]) -> Result<()>;
}

/// Borrowed value encoded with `C`.
#[derive(Debug)]
pub struct BodyValue<'a, T: ?Sized, C> {
    codec: C,
    value: &'a T,
}

impl<'a, T: ?Sized, C> BodyValue<'a, T, C> {
    /// Bind `value` to `codec`.
    pub const fn new(codec: C, value: &'a T) -> Self {
        Self { codec, value }
    }
}

impl<T, C> BodyBinding for BodyValue<'_, T, C>
where
    T: ?Sized + Sync,
    C: Encoder<T>,
{
    fn encode(&self) -> Result<Bytes> {
        self.codec.encode(self.value)
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        self.codec.headers()
    }
}

/// Owned raw payload.
#[derive(Debug, Clone)]
struct RawBody(Bytes);

impl BodyBinding for RawBody {
    fn encode(&self) -> Result<Bytes> {
        Ok(self.0.clone())
    }

    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        RawCodec.headers()
    }
}

/// Mutable target decoded with `C`.
#[derive(Debug)]
pub struct ResponseValue<'a, T, C> {
    codec: C,
    target: &'a mut T,
}

impl<'a, T, C> ResponseValue<'a, T, C> {
    /// Bind `target` to `codec`.
    pub const fn new(codec: C, target: &'a mut T) -> Self {
        Self { codec, target }
    }
}

impl<T, C> ResponseBinding for ResponseValue<'_, T, C>
where
    T: Send,
    C: Decoder<T>,
{
    fn decode(&mut self, data: &[u8]) -> Result<()> {
        self.codec.decode(data, self.target)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// Outcome of a successful [`Call::send`]: status, headers and the drained
/// body.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Reply {
    /// Status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    /// Drained body (already decompressed).
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).map_err(|e| Error::decode("", e.to_string()))
    }

    /// Decode the body into `target` with `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the body does not fit the target.
    pub fn decode_with<T, C: Decoder<T>>(&self, codec: &C, target: &mut T) -> Result<()> {
        codec.decode(&self.body, target)
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the body is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        crate::from_json(&self.body)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handles a response with a given status in place of decoding.
pub trait ResponseHandler: Send {
    /// Handle the reply.
    ///
    /// # Errors
    ///
    /// The error is returned from [`Call::send`] unchanged.
    fn handle(&mut self, reply: &Reply) -> Result<()>;
}

impl<F> ResponseHandler for F
where
    F: FnMut(&Reply) -> Result<()> + Send,
{
    fn handle(&mut self, reply: &Reply) -> Result<()> {
        self(reply)
    }
}

// ============================================================================
// Call
// ============================================================================

/// Fluent builder for one logical call.
///
/// Borrowed bindings (`body`, `response`, handlers) live for `'a`; the call
/// is consumed by [`Call::send`].
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use messenger::{Call, CallContext, DispatchFuture, Dispatcher, Request, Response};
///
/// struct Echo;
///
/// impl Dispatcher for Echo {
///     fn dispatch<'a>(&'a self, _cx: &'a CallContext, request: Request) -> DispatchFuture<'a> {
///         let body = request.body().cloned().unwrap_or_default();
///         Box::pin(async move { Ok(Response::new(200, HashMap::new(), body)) })
///     }
/// }
///
/// # tokio_test(async {
/// let sent = vec!["a", "b", "c"];
/// let mut received: Vec<String> = Vec::new();
///
/// Call::new()
///     .dispatcher(Arc::new(Echo))
///     .post("example.com")
///     .json(&sent)
///     .json_response(&mut received)
///     .send(&CallContext::new())
///     .await
///     .expect("send");
///
/// assert_eq!(received, ["a", "b", "c"]);
/// # });
/// # fn tokio_test(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().expect("runtime").block_on(f);
/// # }
/// ```
pub struct Call<'a> {
    method: Method,
    url: String,
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
    dispatcher: Option<BoxDispatcher>,
    codec: Arc<dyn Codec>,
    validator: Arc<dyn Validator>,
    body: Option<Box<dyn BodyBinding + 'a>>,
    response: Option<Box<dyn ResponseBinding + 'a>>,
    handlers: HashMap<u16, Box<dyn ResponseHandler + 'a>>,
}

impl std::fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("has_dispatcher", &self.dispatcher.is_some())
            .field("has_body", &self.body.is_some())
            .field("has_response", &self.response.is_some())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for Call<'_> {
    fn default() -> Self {
        Self {
            method: Method::Get,
            url: String::new(),
            params: HashMap::new(),
            headers: HashMap::new(),
            dispatcher: None,
            codec: Arc::new(RawCodec),
            validator: Arc::new(DefaultValidator),
            body: None,
            response: None,
            handlers: HashMap::new(),
        }
    }
}

impl<'a> Call<'a> {
    /// An unbound `GET` call with the raw codec and the default validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Target
    // ========================================================================

    /// Set method and URL. A URL without scheme gets `http://`.
    #[must_use]
    pub fn request(mut self, method: Method, url: impl Into<String>) -> Self {
        self.method = method;
        self.url = url.into();
        self
    }

    /// `GET url`.
    #[must_use]
    pub fn get(self, url: impl Into<String>) -> Self {
        self.request(Method::Get, url)
    }

    /// `POST url`. Requires a body.
    #[must_use]
    pub fn post(self, url: impl Into<String>) -> Self {
        self.request(Method::Post, url)
    }

    /// `PUT url`.
    #[must_use]
    pub fn put(self, url: impl Into<String>) -> Self {
        self.request(Method::Put, url)
    }

    /// `PATCH url`.
    #[must_use]
    pub fn patch(self, url: impl Into<String>) -> Self {
        self.request(Method::Patch, url)
    }

    /// `DELETE url`.
    #[must_use]
    pub fn delete(self, url: impl Into<String>) -> Self {
        self.request(Method::Delete, url)
    }

    /// Set a query parameter, replacing a previous value.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set several query parameters.
    #[must_use]
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a header, replacing a previous value of any case.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Set several headers.
    #[must_use]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            set_header(&mut self.headers, name.into(), value.into());
        }
        self
    }

    // ========================================================================
    // Payloads
    // ========================================================================

    /// Bind a request body encoded with `codec`.
    #[must_use]
    pub fn body<T, C>(mut self, codec: C, value: &'a T) -> Self
    where
        T: ?Sized + Sync,
        C: Encoder<T> + 'a,
    {
        self.body = Some(Box::new(BodyValue::new(codec, value)));
        self
    }

    /// Bind a JSON request body.
    #[must_use]
    pub fn json<T>(self, value: &'a T) -> Self
    where
        T: serde::Serialize + ?Sized + Sync,
    {
        self.body(JsonCodec, value)
    }

    /// Bind raw request bytes.
    #[must_use]
    pub fn raw(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Box::new(RawBody(body.into())));
        self
    }

    /// Decode a `200` body into `target` with `codec`.
    #[must_use]
    pub fn response<T, C>(mut self, codec: C, target: &'a mut T) -> Self
    where
        T: Send,
        C: Decoder<T> + 'a,
    {
        self.response = Some(Box::new(ResponseValue::new(codec, target)));
        self
    }

    /// Decode a `200` JSON body into `target`.
    #[must_use]
    pub fn json_response<T>(self, target: &'a mut T) -> Self
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.response(JsonCodec, target)
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Handle responses with `status` through `handler` instead of decoding.
    #[must_use]
    pub fn handler(mut self, status: u16, handler: impl ResponseHandler + 'a) -> Self {
        self.handlers.insert(status, Box::new(handler));
        self
    }

    /// Register several handlers.
    #[must_use]
    pub fn handlers<H>(mut self, handlers: impl IntoIterator<Item = (u16, H)>) -> Self
    where
        H: ResponseHandler + 'a,
    {
        for (status, handler) in handlers {
            self.handlers.insert(status, Box::new(handler));
        }
        self
    }

    /// Replace the validator.
    #[must_use]
    pub fn validator(self, validator: impl Validator + 'static) -> Self {
        self.shared_validator(Arc::new(validator))
    }

    /// Replace the validator with a shared one.
    #[must_use]
    pub fn shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Replace the call codec, which encodes an absent body and supplies
    /// implied headers when no body is bound.
    #[must_use]
    pub fn codec(self, codec: impl Codec + 'static) -> Self {
        self.shared_codec(Arc::new(codec))
    }

    /// Replace the call codec with a shared one.
    #[must_use]
    pub fn shared_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Bind the dispatcher.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: BoxDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// Run the call.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingField`] if the URL, the dispatcher, or a required
    ///   body is missing; nothing is dispatched
    /// - [`Error::Encode`] / [`Error::InvalidUrl`] while building the request
    /// - [`Error::Send`] wrapping any dispatch failure
    /// - whatever the validator rejects the response with
    /// - the error of the selected handler, or [`Error::Decode`]
    pub async fn send(self, cx: &CallContext) -> Result<Reply> {
        let Self {
            method,
            url,
            params,
            headers,
            dispatcher,
            codec,
            validator,
            body,
            mut response,
            mut handlers,
        } = self;

        if url.is_empty() {
            return Err(Error::MissingField(Field::Url));
        }
        let dispatcher = dispatcher.ok_or(Error::MissingField(Field::Dispatcher))?;
        if method.requires_body() && body.is_none() {
            return Err(Error::MissingField(Field::Body));
        }

        let (payload, implied) = match &body {
            Some(binding) => (binding.encode()?, binding.headers()),
            None => (codec.empty(), codec.headers()),
        };

        let url = Url::parse(&ensure_scheme(&url))?;
        let mut builder = Request::builder(method, url)
            .query_pairs(&params)
            .headers(headers);
        for &(name, value) in implied {
            builder = builder.header(name, value);
        }
        if !payload.is_empty() {
            builder = builder.body(payload);
        }
        let request = builder.build();

        let cx = cx.with_delivery(&request);
        let wire = dispatcher
            .dispatch(&cx, request)
            .await
            .map_err(Error::send)?;

        let (status, headers, raw) = wire.into_parts();
        let drained = drain(raw);
        if drained.was_compressed() {
            debug!(status, "decompressed gzip response body");
        }
        let reply = Reply {
            status,
            headers,
            body: drained.into_bytes(),
        };

        validator.validate(reply.status, &reply.body)?;

        if let Some(handler) = handlers.get_mut(&reply.status) {
            handler.handle(&reply)?;
        } else if reply.status == 200
            && let Some(binding) = response.as_mut()
        {
            binding.decode(&reply.body)?;
        }

        Ok(reply)
    }
}

/// Prefix `http://` unless the URL already names `http` or `https`.
fn ensure_scheme(url: &str) -> String {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
