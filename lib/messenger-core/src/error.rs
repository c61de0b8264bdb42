//! Error types for messenger.
//!
//! Every variant renders with a prefix naming the phase that failed
//! (`build`, `encode body`, `send request`, `read response`,
//! `validate response`, `decode response`, `handle response`).

use derive_more::{Display, Error, From};

// ============================================================================
// Error Kind
// ============================================================================

/// Category of an [`Error`], used for identity-based matching.
///
/// Retry classifiers compare kinds rather than messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// A required builder field is missing or invalid.
    #[display("configuration")]
    Configuration,
    /// The request body could not be encoded.
    #[display("encode")]
    Encode,
    /// The transport failed (connectivity, DNS, TLS).
    #[display("transport")]
    Transport,
    /// The response body could not be read.
    #[display("read")]
    Read,
    /// The call was cancelled by its caller.
    #[display("cancelled")]
    Cancelled,
    /// The call deadline passed.
    #[display("deadline exceeded")]
    DeadlineExceeded,
    /// The validator rejected the response.
    #[display("validation")]
    Validation,
    /// The response body did not match the expected shape.
    #[display("decode")]
    Decode,
    /// A status handler reported a failure.
    #[display("handler")]
    Handler,
}

/// Builder field that must be set before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Field {
    /// Target URL.
    #[display("url")]
    Url,
    /// Dispatcher the call is sent through.
    #[display("dispatcher")]
    Dispatcher,
    /// Request body (for methods that require one).
    #[display("body")]
    Body,
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for messenger operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A required field was not set on the builder.
    #[display("build: {_0} is required")]
    #[from(skip)]
    MissingField(#[error(not(source))] Field),

    /// URL parsing error.
    #[display("build: invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Invalid request configuration.
    #[display("build: invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// Body serialization error.
    #[display("encode body: {_0}")]
    #[from]
    Encode(serde_json::Error),

    /// Dispatch failure, wrapped with call-site context.
    #[display("send request: {_0}")]
    #[from(skip)]
    Send(Box<Error>),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Response body could not be read.
    #[display("read response: {_0}")]
    #[from(skip)]
    Read(#[error(not(source))] String),

    /// The call was cancelled.
    #[display("context canceled")]
    #[from(skip)]
    Cancelled,

    /// The call deadline passed.
    #[display("context deadline exceeded")]
    #[from(skip)]
    DeadlineExceeded,

    /// Response rejected by the validator.
    #[display("validate response: HTTP {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Response body, if available.
        #[error(not(source))]
        body: Option<bytes::Bytes>,
    },

    /// Body deserialization error with path context.
    #[display("decode response at '{path}': {message}")]
    #[from(skip)]
    Decode {
        /// Path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// A status handler failed.
    #[display("handle response: {_0}")]
    #[from(skip)]
    Handler(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an HTTP error from status code and message.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create an HTTP error with body.
    #[must_use]
    pub fn http_with_body(status: u16, message: impl Into<String>, body: bytes::Bytes) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: Some(body),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a response read error.
    #[must_use]
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a decode error with path context.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a handler error.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Wrap a dispatch failure with call-site context.
    #[must_use]
    pub fn send(inner: Self) -> Self {
        Self::Send(Box::new(inner))
    }

    /// Category of this error. Sees through [`Error::Send`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::InvalidUrl(_) | Self::InvalidRequest(_) => {
                ErrorKind::Configuration
            }
            Self::Encode(_) => ErrorKind::Encode,
            Self::Send(inner) => inner.kind(),
            Self::Connection(_) | Self::Tls(_) => ErrorKind::Transport,
            Self::Read(_) => ErrorKind::Read,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Http { .. } => ErrorKind::Validation,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Returns `true` if the call ended because its context was cancelled
    /// or its deadline passed.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Cancelled | ErrorKind::DeadlineExceeded
        )
    }

    /// Returns `true` if this is a deadline error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::DeadlineExceeded
    }

    /// Returns `true` if this is a transport error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Returns the HTTP status code if this is a validation error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Send(inner) => inner.status(),
            _ => None,
        }
    }

    /// Returns the response body if this is a validation error with a body.
    #[must_use]
    pub fn body(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            Self::Send(inner) => inner.body(),
            _ => None,
        }
    }

    /// Try to decode the rejected response body as JSON.
    ///
    /// Returns `None` if there is no body or this is not a validation error.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.body().map(|body| crate::from_json(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_phase() {
        let err = Error::MissingField(Field::Url);
        assert_eq!(err.to_string(), "build: url is required");

        let err = Error::send(Error::connection("refused"));
        assert_eq!(err.to_string(), "send request: connection error: refused");

        let err = Error::http(500, "unexpected status 500: boom");
        assert_eq!(
            err.to_string(),
            "validate response: HTTP 500: unexpected status 500: boom"
        );

        let err = Error::decode("user.address.city", "missing field `city`");
        assert_eq!(
            err.to_string(),
            "decode response at 'user.address.city': missing field `city`"
        );

        assert_eq!(Error::Cancelled.to_string(), "context canceled");
        assert_eq!(
            Error::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }

    #[test]
    fn kind_sees_through_send() {
        let err = Error::send(Error::DeadlineExceeded);
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(err.is_cancellation());
        assert!(err.is_timeout());

        let err = Error::send(Error::tls("bad certificate"));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_connection());
        assert!(!err.is_cancellation());
    }

    #[test]
    fn cancellation_is_distinct_from_transport() {
        assert_ne!(Error::Cancelled.kind(), Error::connection("x").kind());
        assert!(Error::Cancelled.is_cancellation());
        assert!(!Error::Cancelled.is_timeout());
    }

    #[test]
    fn configuration_kinds() {
        assert_eq!(
            Error::MissingField(Field::Body).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::invalid_request("bad header").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn error_status_and_body() {
        let body = bytes::Bytes::from(r#"{"error": "not found"}"#);
        let err = Error::send(Error::http_with_body(404, "Not Found", body.clone()));
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some(&body));

        assert_eq!(Error::Cancelled.status(), None);
        assert!(Error::http(404, "Not Found").body().is_none());
    }

    #[test]
    fn error_decode_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct ApiError {
            error: String,
        }

        let body = bytes::Bytes::from(r#"{"error": "not found"}"#);
        let err = Error::http_with_body(404, "Not Found", body);

        let decoded = err
            .decode_body::<ApiError>()
            .expect("should have body")
            .expect("should decode");
        assert_eq!(
            decoded,
            ApiError {
                error: "not found".to_string()
            }
        );

        assert!(Error::Cancelled.decode_body::<ApiError>().is_none());
    }
}
