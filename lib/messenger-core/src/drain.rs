//! Body drain helper.
//!
//! Consumes a payload once and hands back a buffer every later reader can
//! share. Gzip-framed payloads (magic prefix `1f 8b`) are decompressed on the
//! way through; a corrupt gzip stream is passed through untouched.

use std::io::Read;

use bytes::{Buf, Bytes};

/// Gzip member header magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A drained payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    bytes: Bytes,
    decompressed: bool,
}

impl Drained {
    /// Drained bytes (decompressed when the payload was gzip-framed).
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Consume into the drained bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// A fresh reader over the drained bytes.
    #[must_use]
    pub fn reader(&self) -> impl Read + use<> {
        self.bytes.clone().reader()
    }

    /// Returns `true` if the payload was gzip-framed and got decompressed.
    #[must_use]
    pub const fn was_compressed(&self) -> bool {
        self.decompressed
    }

    /// Drained bytes as lossy UTF-8, for logging.
    #[must_use]
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Returns `true` if `data` starts with the gzip magic prefix.
#[must_use]
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Drain a payload, transparently decompressing gzip framing.
///
/// Concatenated gzip members decode as one stream.
#[must_use]
pub fn drain(body: Bytes) -> Drained {
    if !is_gzip(&body) {
        return Drained {
            bytes: body,
            decompressed: false,
        };
    }

    let mut decoder = flate2::read::MultiGzDecoder::new(body.as_ref());
    let mut plain = Vec::new();
    match decoder.read_to_end(&mut plain) {
        Ok(_) => Drained {
            bytes: Bytes::from(plain),
            decompressed: true,
        },
        Err(_) => Drained {
            bytes: body,
            decompressed: false,
        },
    }
}
