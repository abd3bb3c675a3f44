use std::io;
use std::sync::Arc;

/// A caller bug: the operation is not allowed in the response's current
/// state, or was given a value the response cannot use.
///
/// Returned synchronously from the public entry points of
/// [`ServerResponse`](crate::ServerResponse). The attempted mutation is
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("headers already sent")]
    HeadersSent,
    #[error("trailers already sent")]
    TrailersSent,
    #[error("response already ended")]
    Ended,
    #[error("stream was reset")]
    Reset,
    #[error("unsupported message encoding")]
    UnsupportedEncoding,
}

/// Failure to turn an application value into a gRPC frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("marshal failed: {0}")]
    Marshal(String),
}

/// The failure a [`Completion`](crate::Completion) resolves to.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("stream reset")]
    StreamReset,
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },
    #[error("transport error: {0}")]
    Transport(Arc<io::Error>),
}

impl Error {
    /// Whether this error was caused by a stream reset.
    pub fn is_reset(&self) -> bool {
        matches!(self, Error::StreamReset)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(Arc::new(e))
    }
}
