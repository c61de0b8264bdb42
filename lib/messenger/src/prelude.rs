//! Prelude module for convenient imports.
//!
//! ```
//! use messenger::prelude::*;
//! ```

pub use crate::{
    Call, CallContext, Codec, DefaultValidator, Dispatcher, Error, ErrorKind, JsonCodec, Messenger,
    Method, RawCodec, Reply, Request, Response, Result, Transport, Validator,
};
pub use serde::{Deserialize, Serialize};
pub use tower::Layer;
