//! Application value to wire frame conversion.

use crate::error::EncodeError;
use crate::frame::GrpcMessage;

use bytes::Bytes;

/// Turns one application value into a single length-prefixed gRPC frame.
///
/// `encoding` is the wire name of the compression currently configured on
/// the response. Implementations must return exactly one complete frame.
pub trait MessageEncoder<T> {
    fn encode(&self, value: &T, encoding: &str) -> Result<Bytes, EncodeError>;
}

/// Encoder built from a marshalling function.
///
/// The function serializes the value (e.g. protobuf) into a [`GrpcMessage`];
/// framing and compression are then applied by [`GrpcMessage::encode`].
pub struct MarshalEncoder<F> {
    marshal: F,
}

impl<F> MarshalEncoder<F> {
    pub fn new(marshal: F) -> Self {
        Self { marshal }
    }
}

impl<T, F> MessageEncoder<T> for MarshalEncoder<F>
where
    F: Fn(&T) -> Result<GrpcMessage, EncodeError>,
{
    fn encode(&self, value: &T, encoding: &str) -> Result<Bytes, EncodeError> {
        (self.marshal)(value)?.encode(encoding)
    }
}

/// Encoder for values that already are serialized bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl<T: AsRef<[u8]>> MessageEncoder<T> for RawEncoder {
    fn encode(&self, value: &T, encoding: &str) -> Result<Bytes, EncodeError> {
        GrpcMessage::new(Bytes::copy_from_slice(value.as_ref())).encode(encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoder() {
        let framed = RawEncoder.encode(&b"hi".to_vec(), "identity").unwrap();
        assert_eq!(&framed[..], &[0, 0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_marshal_encoder() {
        let encoder = MarshalEncoder::new(|value: &u32| {
            Ok(GrpcMessage::new(Bytes::copy_from_slice(&value.to_be_bytes())))
        });

        let framed = encoder.encode(&258, "identity").unwrap();
        assert_eq!(&framed[..], &[0, 0, 0, 0, 4, 0, 0, 1, 2]);
    }

    #[test]
    fn test_marshal_failure_propagates() {
        let encoder = MarshalEncoder::new(|_: &u32| -> Result<GrpcMessage, EncodeError> {
            Err(EncodeError::Marshal("bad value".into()))
        });

        assert_eq!(
            encoder.encode(&1, "identity"),
            Err(EncodeError::Marshal("bad value".into()))
        );
    }
}
