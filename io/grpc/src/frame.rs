//! gRPC message framing.
//!
//! Every message on a gRPC stream is length-prefixed:
//! - 1 byte: compressed flag (0 = uncompressed, 1 = compressed)
//! - 4 bytes: payload length (big-endian u32)
//! - N bytes: payload, compressed with the stream's `grpc-encoding` when the
//!   flag is set

use crate::encoding::Encoding;
use crate::error::EncodeError;

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the gRPC message prefix (1 byte flag + 4 bytes length).
pub const HEADER_SIZE: usize = 5;

/// Default maximum message size (4MB, matches the gRPC default).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Frame an uncompressed payload.
pub fn encode_message(data: &[u8]) -> Bytes {
    encode_message_with_compression(data, false)
}

/// Frame a payload with an explicit compressed flag.
///
/// The payload must already be compressed when `compressed` is set.
pub fn encode_message_with_compression(data: &[u8], compressed: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
    buf.put_u8(compressed as u8);
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
    buf.freeze()
}

/// An encoded message payload together with the encoding that produced it.
///
/// This is what a marshaller hands over for a single application value. It
/// lives only for the duration of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcMessage {
    payload: Bytes,
    encoding: Encoding,
}

impl GrpcMessage {
    /// Wrap an uncompressed, marshalled payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            encoding: Encoding::Identity,
        }
    }

    /// Wrap a payload that is already compressed with `encoding`.
    pub fn with_encoding(payload: impl Into<Bytes>, encoding: Encoding) -> Self {
        Self {
            payload: payload.into(),
            encoding,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Produce the length-prefixed frame for this message under the named
    /// encoding.
    ///
    /// An identity payload is compressed on the way out. A payload that is
    /// already compressed can only be framed under its own encoding.
    pub fn encode(&self, encoding: &str) -> Result<Bytes, EncodeError> {
        let target = Encoding::from_name(encoding)?;

        if target == self.encoding {
            return Ok(encode_message_with_compression(
                &self.payload,
                target.is_compressed(),
            ));
        }

        if self.encoding != Encoding::Identity {
            return Err(EncodeError::UnsupportedEncoding(format!(
                "{} payload cannot be sent as {}",
                self.encoding, target
            )));
        }

        let compressed = target.compress(&self.payload)?;
        Ok(encode_message_with_compression(
            &compressed,
            target.is_compressed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_message() {
        let encoded = encode_message(&[]);
        assert_eq!(&encoded[..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_prefix_layout() {
        let data = vec![7u8; 300];
        let encoded = encode_message_with_compression(&data, true);

        assert_eq!(encoded.len(), HEADER_SIZE + 300);
        assert_eq!(encoded[0], 1);
        assert_eq!(&encoded[1..5], &[0, 0, 1, 44]);
        assert_eq!(&encoded[HEADER_SIZE..], &data[..]);
    }

    /// Split one frame off the front of `buf`, if complete.
    fn split_frame(buf: &mut BytesMut) -> Option<(bool, Bytes)> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if buf.len() < HEADER_SIZE + len {
            return None;
        }
        let frame = buf.split_to(HEADER_SIZE + len).freeze();
        Some((frame[0] == 1, frame.slice(HEADER_SIZE..)))
    }

    #[test]
    fn test_back_to_back_frames_stay_separate() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_message(b"first"));
        buf.extend_from_slice(&encode_message_with_compression(b"second", true));
        buf.extend_from_slice(&encode_message(b"thi"));
        buf.truncate(buf.len() - 1);

        let (compressed, payload) = split_frame(&mut buf).unwrap();
        assert!(!compressed);
        assert_eq!(&payload[..], b"first");

        let (compressed, payload) = split_frame(&mut buf).unwrap();
        assert!(compressed);
        assert_eq!(&payload[..], b"second");

        // truncated trailing frame
        assert!(split_frame(&mut buf).is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn test_grpc_message_identity() {
        let msg = GrpcMessage::new(Bytes::from_static(b"abc"));
        let framed = msg.encode("identity").unwrap();
        assert_eq!(&framed[..], &[0, 0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_grpc_message_gzip() {
        let msg = GrpcMessage::new(vec![b'z'; 512]);
        let framed = msg.encode("gzip").unwrap();
        assert_eq!(framed[0], 1);

        let len = u32::from_be_bytes([framed[1], framed[2], framed[3], framed[4]]) as usize;
        assert_eq!(framed.len(), HEADER_SIZE + len);
        assert!(len < 512);
    }

    #[test]
    fn test_grpc_message_precompressed() {
        let msg = GrpcMessage::with_encoding(Bytes::from_static(b"zz"), Encoding::Gzip);
        let framed = msg.encode("gzip").unwrap();
        assert_eq!(&framed[..], &[1, 0, 0, 0, 2, b'z', b'z']);

        assert!(matches!(
            msg.encode("identity"),
            Err(EncodeError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_grpc_message_unknown_encoding() {
        let msg = GrpcMessage::new(Bytes::new());
        assert_eq!(
            msg.encode("snappy"),
            Err(EncodeError::UnsupportedEncoding("snappy".to_string()))
        );
    }
}
