//! grpc-response - server-side gRPC response framing.
//!
//! This crate turns a sequence of application messages into the HTTP/2
//! header block, DATA, and trailer block a gRPC server response consists
//! of. It sits between a service handler and an HTTP/2 stream and enforces
//! the ordering rules of the protocol:
//!
//! - the header block is sent at most once, lazily, on first output
//! - the status is sent exactly once, in the trailer block, or folded into
//!   the header block when no message was ever written (trailers-only)
//! - every message is one length-prefixed gRPC frame
//! - application metadata under the `grpc-` prefix is never forwarded
//!
//! The HTTP/2 stream itself ([`TransportStream`]) and the serialization of
//! application values ([`MessageEncoder`]) are supplied by the caller. It
//! does not use async/await internally; sends return a [`Completion`] that
//! can be awaited, polled, or given a callback.
//!
//! # Example
//!
//! ```ignore
//! use grpc_response::{Code, RawEncoder, ServerResponse};
//!
//! let mut response = ServerResponse::new(stream, RawEncoder);
//! response.set_encoding("gzip")?;
//! response.set_header("x-request-id", "42")?;
//! response.write(&reply_bytes)?;
//! response.set_status(Code::Ok)?;
//! let done = response.end()?;
//! ```

mod completion;
mod config;
mod encoder;
mod encoding;
mod error;
mod frame;
mod metadata;
pub mod metrics;
mod response;
mod status;
mod transport;

pub use completion::Completion;
pub use config::{ConfigError, ReservedMetadataPolicy, ResponseConfig};
pub use encoder::{MarshalEncoder, MessageEncoder, RawEncoder};
pub use encoding::{Encoding, GZIP, IDENTITY};
pub use error::{EncodeError, Error, StateError};
pub use frame::{
    GrpcMessage, HEADER_SIZE, MAX_MESSAGE_SIZE, encode_message, encode_message_with_compression,
};
pub use metadata::{Metadata, RESERVED_PREFIX, is_reserved};
pub use response::{CONTENT_TYPE, ResponseState, ServerResponse};
pub use status::{Code, Status, percent_encode_message};
pub use transport::{DrainHandler, ExceptionHandler, TransportStream};
