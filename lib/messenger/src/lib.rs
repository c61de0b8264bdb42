//! Resilient outbound HTTP calls.
//!
//! A [`Messenger`] dispatches requests through a chain of decorators
//! (headers, timeout, retry, logging, execution policy) wrapped around a
//! transport, and hands out fluent [`Call`] builders that encode a body,
//! dispatch it, then validate and decode the reply.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use messenger::prelude::*;
//! use messenger::middleware::RetryOptions;
//!
//! # async fn run() -> messenger::Result<()> {
//! let messenger = Messenger::builder()
//!     .codec(JsonCodec)
//!     .with_logging()
//!     .with_retry(RetryOptions::default())
//!     .with_timeout(Duration::from_secs(5))
//!     .build();
//!
//! let mut created: Vec<String> = Vec::new();
//! messenger
//!     .call()
//!     .post("https://api.example.com/items")
//!     .json(&["a", "b", "c"])
//!     .json_response(&mut created)
//!     .send(&CallContext::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod call;
mod config;
mod connector;
mod messenger;
pub mod middleware;
pub mod prelude;
mod transport;

pub use call::{
    BodyBinding, BodyValue, Call, Reply, ResponseBinding, ResponseHandler, ResponseValue,
};
pub use config::{TransportConfig, TransportConfigBuilder};
pub use messenger::{Messenger, MessengerBuilder};
pub use transport::{HyperTransport, TransportAdapter, TransportAdapterLayer};

// Re-export tower for layer composition
pub use tower;

// Re-export core types
pub use messenger_core::{
    AcceptAll, Action, ActionFuture, BoxDispatcher, CallContext, Codec, Decoder, DefaultValidator,
    DeliveryContext, DirectPolicy, DispatchFuture, Dispatcher, Drained, Encoder, Error, ErrorKind,
    Field, JsonCodec, Method, Policy, RawCodec, Request, RequestBuilder, Response, Result,
    SuccessValidator, Transport, Validator, drain, from_json, get_header, is_gzip, rejection,
    set_header, to_json,
};

// Re-export http types for status codes
pub use messenger_core::StatusCode;
