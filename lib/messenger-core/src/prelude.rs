//! Prelude module for convenient imports.
//!
//! ```ignore
//! use messenger_core::prelude::*;
//! ```

pub use crate::{
    CallContext, Codec, Decoder, DefaultValidator, Dispatcher, Encoder, Error, ErrorKind, JsonCodec,
    Method, RawCodec, Request, Response, Result, Transport, Validator,
};
