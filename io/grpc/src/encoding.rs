//! Message compression.
//!
//! The name configured on a response (`identity`, `gzip`) selects how each
//! message payload is compressed before it is length-prefixed. The same
//! name is advertised to the peer in the `grpc-encoding` header.

use crate::error::EncodeError;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::io::Write;

/// Name of the no-op encoding.
pub const IDENTITY: &str = "identity";

/// Name of the gzip encoding.
pub const GZIP: &str = "gzip";

/// A supported message encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Payload is sent as-is, compressed flag 0.
    #[default]
    Identity,
    /// Payload is gzip compressed, compressed flag 1.
    Gzip,
}

impl Encoding {
    /// Look up an encoding by its wire name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, EncodeError> {
        if name.eq_ignore_ascii_case(IDENTITY) {
            Ok(Encoding::Identity)
        } else if name.eq_ignore_ascii_case(GZIP) {
            Ok(Encoding::Gzip)
        } else {
            Err(EncodeError::UnsupportedEncoding(name.to_string()))
        }
    }

    /// Wire name of this encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Identity => IDENTITY,
            Encoding::Gzip => GZIP,
        }
    }

    /// Whether frames produced with this encoding set the compressed flag.
    pub fn is_compressed(self) -> bool {
        !matches!(self, Encoding::Identity)
    }

    /// Apply this encoding to a message payload.
    pub fn compress(self, payload: &[u8]) -> Result<Bytes, EncodeError> {
        match self {
            Encoding::Identity => Ok(Bytes::copy_from_slice(payload)),
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(
                    Vec::with_capacity(payload.len() / 2 + 32),
                    Compression::default(),
                );
                encoder
                    .write_all(payload)
                    .map_err(|e| EncodeError::Compression(e.to_string()))?;
                let compressed = encoder
                    .finish()
                    .map_err(|e| EncodeError::Compression(e.to_string()))?;
                Ok(Bytes::from(compressed))
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
