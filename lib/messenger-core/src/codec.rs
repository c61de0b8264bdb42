//! Payload codecs.
//!
//! A codec turns a typed value into a byte payload and back, and names the
//! headers that payload implies. [`RawCodec`] passes bytes and text through
//! unchanged; [`JsonCodec`] speaks JSON.
//!
//! Codecs are stateless and shared freely between concurrent calls.

use bytes::Bytes;

use crate::{Error, Result};

/// Headers implied by the JSON codec.
const JSON_HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/json; charset=UTF-8"),
    ("Accept-Charset", "utf-8"),
    ("Accept-Encoding", "gzip"),
    ("Accept", "application/json"),
];

/// Payload format shared by every [`Encoder`] and [`Decoder`].
pub trait Codec: Send + Sync {
    /// Headers describing the encoded payload.
    fn headers(&self) -> &'static [(&'static str, &'static str)];

    /// Payload sent when no body is bound.
    fn empty(&self) -> Bytes;
}

/// Encodes values of type `T`.
pub trait Encoder<T: ?Sized>: Codec {
    /// Encode `value` into a payload.
    fn encode(&self, value: &T) -> Result<Bytes>;
}

/// Decodes payloads into values of type `T`.
///
/// An empty payload leaves the target untouched.
pub trait Decoder<T>: Codec {
    /// Decode `data` into `target`.
    fn decode(&self, data: &[u8], target: &mut T) -> Result<()>;
}

// ============================================================================
// Raw Codec
// ============================================================================

/// Passthrough codec for bytes and text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    fn empty(&self) -> Bytes {
        Bytes::new()
    }
}

impl Encoder<Bytes> for RawCodec {
    fn encode(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }
}

impl Encoder<Vec<u8>> for RawCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value))
    }
}

impl Encoder<[u8]> for RawCodec {
    fn encode(&self, value: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value))
    }
}

impl Encoder<String> for RawCodec {
    fn encode(&self, value: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl Encoder<str> for RawCodec {
    fn encode(&self, value: &str) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl Decoder<Bytes> for RawCodec {
    fn decode(&self, data: &[u8], target: &mut Bytes) -> Result<()> {
        if !data.is_empty() {
            *target = Bytes::copy_from_slice(data);
        }
        Ok(())
    }
}

impl Decoder<Vec<u8>> for RawCodec {
    fn decode(&self, data: &[u8], target: &mut Vec<u8>) -> Result<()> {
        if !data.is_empty() {
            *target = data.to_vec();
        }
        Ok(())
    }
}

impl Decoder<String> for RawCodec {
    fn decode(&self, data: &[u8], target: &mut String) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let text = std::str::from_utf8(data).map_err(|e| Error::decode("", e.to_string()))?;
        text.clone_into(target);
        Ok(())
    }
}

// ============================================================================
// JSON Codec
// ============================================================================

/// JSON codec backed by `serde_json`.
///
/// An absent body encodes to `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn headers(&self) -> &'static [(&'static str, &'static str)] {
        JSON_HEADERS
    }

    fn empty(&self) -> Bytes {
        Bytes::from_static(b"{}")
    }
}

impl<T: serde::Serialize + ?Sized> Encoder<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Bytes> {
        to_json(value)
    }
}

impl<T: serde::de::DeserializeOwned> Decoder<T> for JsonCodec {
    fn decode(&self, data: &[u8], target: &mut T) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        *target = from_json(data)?;
        Ok(())
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use messenger_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so the error names the field that failed
/// (e.g., "user.address.city").
///
/// # Errors
///
/// Returns an error if JSON deserialization fails.
///
/// # Example
///
/// ```
/// use messenger_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let bytes = br#"{"name":"Alice"}"#;
/// let user: User = from_json(bytes).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| Error::decode(e.path().to_string(), e.inner().to_string()))
}
