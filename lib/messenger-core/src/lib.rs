//! Core types and traits for the messenger HTTP dispatch pipeline.
//!
//! This crate provides the foundational types used by messenger:
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`RequestBuilder`] - Wire request types
//! - [`Response`] - Wire response type
//! - [`Error`], [`ErrorKind`] and [`Result`] - Error handling
//! - [`CallContext`] and [`DeliveryContext`] - Per-call cancellation, deadline and delivery
//! - [`Dispatcher`], [`Transport`] and [`Policy`] - Dispatch capabilities
//! - [`Codec`], [`RawCodec`] and [`JsonCodec`] - Payload codecs
//! - [`drain`] - Body drain helper with transparent gzip decompression
//! - [`Validator`] - Response acceptance

mod client;
mod codec;
mod context;
mod drain;
mod error;
mod method;
pub mod prelude;
mod request;
mod response;
mod validator;

pub use client::{
    Action, ActionFuture, BoxDispatcher, DirectPolicy, DispatchFuture, Dispatcher, Policy,
    Transport,
};
pub use codec::{Codec, Decoder, Encoder, JsonCodec, RawCodec, from_json, to_json};
pub use context::{CallContext, DeliveryContext};
pub use drain::{Drained, drain, is_gzip};
pub use error::{Error, ErrorKind, Field, Result};
pub use method::Method;
pub use request::{Request, RequestBuilder, get_header, set_header};
pub use response::Response;
pub use validator::{AcceptAll, DefaultValidator, SuccessValidator, Validator, rejection};

// Re-export http crate types for status codes
pub use http::StatusCode;
