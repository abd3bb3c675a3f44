//! Server-side gRPC response framing.
//!
//! A [`ServerResponse`] owns the outbound half of one gRPC call. It turns
//! application values into length-prefixed DATA, emits the response header
//! block lazily on first output, and places the final status either in that
//! header block (trailers-only response) or in a trailer block.
//!
//! ```text
//!          write / end_with          end
//!   Init ------------------> HeadersSent ------> TrailersSent
//!     |  \                        |
//!     |   `---- end (no body) ----+----------->  TrailersSent
//!     |                           |
//!     `--------- reset -----------+----------->  Reset
//! ```
//!
//! All methods must be called from a single logical execution context; the
//! response does no locking of its own.

use crate::completion::Completion;
use crate::config::{ReservedMetadataPolicy, ResponseConfig};
use crate::encoder::MessageEncoder;
use crate::encoding::Encoding;
use crate::error::{Error, StateError};
use crate::metadata::{Metadata, is_reserved};
use crate::metrics;
use crate::status::{self, Code, Status};
use crate::transport::TransportStream;

use bytes::Bytes;
use std::io;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// `content-type` of every gRPC response.
pub const CONTENT_TYPE: &str = "application/grpc";

const GRPC_STATUS: &str = "grpc-status";
const GRPC_MESSAGE: &str = "grpc-message";
const GRPC_ENCODING: &str = "grpc-encoding";
const GRPC_ACCEPT_ENCODING: &str = "grpc-accept-encoding";

/// Where a response is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing sent yet; headers, trailers and status may all be changed.
    Init,
    /// Header block sent; messages may still be written.
    HeadersSent,
    /// Status sent, either in trailers or folded into headers. Terminal.
    TrailersSent,
    /// Stream aborted without a status. Terminal.
    Reset,
}

/// Which block a piece of application metadata was destined for.
#[derive(Debug, Clone, Copy)]
enum Block {
    Headers,
    Trailers,
}

impl Block {
    fn as_str(self) -> &'static str {
        match self {
            Block::Headers => "header",
            Block::Trailers => "trailer",
        }
    }
}

/// The outbound half of one gRPC call.
///
/// `T` is the application message type, `S` the HTTP/2 stream, `E` the
/// encoder that frames each `T`.
pub struct ServerResponse<T, S, E> {
    stream: S,
    encoder: E,
    config: Arc<ResponseConfig>,
    state: ResponseState,
    status: Status,
    encoding: Encoding,
    headers: Option<Metadata>,
    trailers: Option<Metadata>,
    /// Completions not yet resolved; failed on reset.
    in_flight: Vec<Completion>,
    _message: PhantomData<fn(&T)>,
}

impl<T, S, E> ServerResponse<T, S, E>
where
    S: TransportStream,
    E: MessageEncoder<T>,
{
    /// Create a response with the default configuration.
    pub fn new(stream: S, encoder: E) -> Self {
        Self::with_config(stream, encoder, Arc::new(ResponseConfig::default()))
    }

    /// Create a response sharing a server-wide configuration.
    pub fn with_config(stream: S, encoder: E, config: Arc<ResponseConfig>) -> Self {
        let encoding = Encoding::from_name(&config.default_encoding).unwrap_or_else(|_| {
            warn!(
                encoding = %config.default_encoding,
                "unsupported default encoding, using identity"
            );
            Encoding::Identity
        });
        Self {
            stream,
            encoder,
            config,
            state: ResponseState::Init,
            status: Status::ok(),
            encoding,
            headers: None,
            trailers: None,
            in_flight: Vec::new(),
            _message: PhantomData,
        }
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn encoding(&self) -> &str {
        self.encoding.as_str()
    }

    pub fn headers_sent(&self) -> bool {
        self.state != ResponseState::Init
    }

    pub fn trailers_sent(&self) -> bool {
        self.state == ResponseState::TrailersSent
    }

    pub fn is_reset(&self) -> bool {
        self.state == ResponseState::Reset
    }

    /// The underlying stream.
    pub fn transport(&self) -> &S {
        &self.stream
    }

    /// Set the status code sent when the response ends. The last value set
    /// before the end wins.
    pub fn set_status(&mut self, code: Code) -> Result<&mut Self, StateError> {
        self.check_status_mutable()?;
        self.status.set_code(code);
        Ok(self)
    }

    /// Set the human readable `grpc-message` sent alongside the status.
    pub fn set_status_message(
        &mut self,
        message: impl Into<String>,
    ) -> Result<&mut Self, StateError> {
        self.check_status_mutable()?;
        self.status.set_message(Some(message.into()));
        Ok(self)
    }

    /// Replace code and message at once.
    pub fn set_status_full(&mut self, status: Status) -> Result<&mut Self, StateError> {
        self.check_status_mutable()?;
        self.status = status;
        Ok(self)
    }

    /// Change the encoding applied to subsequently written messages.
    ///
    /// Names are matched case-insensitively; the canonical lower case name is
    /// what gets advertised. An unsupported name fails and leaves the current
    /// encoding in place. The `grpc-encoding` header reflects the value at the
    /// time headers are sent.
    pub fn set_encoding(&mut self, name: &str) -> Result<&mut Self, StateError> {
        self.check_status_mutable()?;
        let encoding = Encoding::from_name(name).map_err(|_| {
            debug!(encoding = name, "rejecting unsupported encoding");
            StateError::UnsupportedEncoding
        })?;
        if self.headers_sent() && encoding != self.encoding {
            debug!(
                from = %self.encoding,
                to = %encoding,
                "encoding changed after grpc-encoding was advertised"
            );
        }
        self.encoding = encoding;
        Ok(self)
    }

    /// Set a custom response header, replacing earlier values for the key.
    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, StateError> {
        self.headers_mut()?.set(key, value);
        Ok(self)
    }

    /// Set a custom trailer, replacing earlier values for the key.
    pub fn set_trailer(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, StateError> {
        self.trailers_mut()?.set(key, value);
        Ok(self)
    }

    /// Pending custom headers. Fails once the header block has been sent.
    pub fn headers_mut(&mut self) -> Result<&mut Metadata, StateError> {
        match self.state {
            ResponseState::Reset => Err(StateError::Reset),
            ResponseState::Init => Ok(self.headers.get_or_insert_with(Metadata::new)),
            ResponseState::HeadersSent | ResponseState::TrailersSent => {
                Err(StateError::HeadersSent)
            }
        }
    }

    /// Pending custom trailers. Fails once the status has been sent.
    pub fn trailers_mut(&mut self) -> Result<&mut Metadata, StateError> {
        match self.state {
            ResponseState::Reset => Err(StateError::Reset),
            ResponseState::TrailersSent => Err(StateError::TrailersSent),
            ResponseState::Init | ResponseState::HeadersSent => {
                Ok(self.trailers.get_or_insert_with(Metadata::new))
            }
        }
    }

    /// Encode and send one message, sending the header block first if
    /// needed. Never ends the stream.
    pub fn write(&mut self, message: &T) -> Result<Completion, StateError> {
        self.send(Some(message), false)
    }

    /// End the response without a further message.
    ///
    /// If nothing was written yet and no custom trailers are pending, the
    /// status is folded into the header block and no trailer block is sent.
    pub fn end(&mut self) -> Result<Completion, StateError> {
        self.send(None, true)
    }

    /// Write a final message and end the response.
    pub fn end_with(&mut self, message: &T) -> Result<Completion, StateError> {
        self.send(Some(message), true)
    }

    /// Abort the stream without sending a status.
    ///
    /// Every unresolved completion fails with [`Error::StreamReset`]. Calling
    /// this again, or after the response ended, has no effect.
    pub fn reset(&mut self) {
        match self.state {
            ResponseState::Reset => return,
            ResponseState::TrailersSent => {
                debug!("reset after response ended, ignoring");
                return;
            }
            ResponseState::Init | ResponseState::HeadersSent => {}
        }

        debug!(state = ?self.state, "resetting response stream");
        self.state = ResponseState::Reset;
        self.headers = None;
        self.trailers = None;
        self.stream.reset();
        metrics::RESPONSES_RESET.increment();

        for completion in self.in_flight.drain(..) {
            completion.complete(Err(Error::StreamReset));
        }
    }

    /// Whether the transport's write queue is full.
    pub fn write_queue_full(&self) -> bool {
        self.stream.write_queue_full()
    }

    /// Set the transport's write queue high water mark.
    pub fn set_write_queue_max_size(&mut self, max_size: usize) -> &mut Self {
        self.stream.set_write_queue_max_size(max_size);
        self
    }

    /// Register a handler run when the transport's write queue drains.
    pub fn drain_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.stream.on_drain(Box::new(handler));
        self
    }

    /// Register a handler run on transport-level failures.
    pub fn exception_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&io::Error) + Send + 'static,
    {
        self.stream.on_exception(Box::new(handler));
        self
    }

    fn check_status_mutable(&self) -> Result<(), StateError> {
        match self.state {
            ResponseState::Reset => Err(StateError::Reset),
            ResponseState::TrailersSent => Err(StateError::Ended),
            ResponseState::Init | ResponseState::HeadersSent => Ok(()),
        }
    }

    fn send(&mut self, message: Option<&T>, end: bool) -> Result<Completion, StateError> {
        match self.state {
            ResponseState::TrailersSent => return Err(StateError::Ended),
            ResponseState::Reset => return Ok(Completion::failed(Error::StreamReset)),
            ResponseState::Init | ResponseState::HeadersSent => {}
        }

        self.in_flight.retain(|c| !c.is_complete());

        // Encode before anything reaches the wire so a failure leaves the
        // response untouched.
        let frame = match message.map(|m| self.encode(m)).transpose() {
            Ok(frame) => frame,
            Err(e) => return Ok(Completion::failed(e)),
        };

        let trailers_only = end
            && frame.is_none()
            && self.state == ResponseState::Init
            && !self.has_custom_trailers();

        let mut sends = Vec::with_capacity(3);
        if self.state == ResponseState::Init {
            sends.push(self.send_headers(trailers_only));
        }

        if let Some(frame) = frame {
            trace!(len = frame.len(), encoding = %self.encoding, "writing message");
            metrics::MESSAGES_SENT.increment();
            metrics::MESSAGE_BYTES_SENT.add(frame.len() as u64);
            sends.push(self.stream.send_data(frame, false));
        }

        if end && !trailers_only {
            sends.push(self.send_trailers());
        }

        let completion = Completion::all(sends);
        if !completion.is_complete() {
            self.in_flight.push(completion.clone());
        }
        Ok(completion)
    }

    fn encode(&self, message: &T) -> Result<Bytes, Error> {
        let frame = self.encoder.encode(message, self.encoding.as_str())?;
        let limit = self.config.max_send_message_size;
        if frame.len() > limit {
            return Err(Error::MessageTooLarge {
                size: frame.len(),
                limit,
            });
        }
        Ok(frame)
    }

    fn has_custom_trailers(&self) -> bool {
        self.trailers
            .as_ref()
            .is_some_and(|t| t.iter().any(|(k, _)| forwardable(k)))
    }

    fn send_headers(&mut self, trailers_only: bool) -> Completion {
        let mut block = Metadata::new();
        block.insert(":status", "200");
        if let Some(pending) = self.headers.take() {
            self.append_custom(&mut block, &pending, Block::Headers);
        }
        block.set("content-type", CONTENT_TYPE);
        block.set(GRPC_ENCODING, self.encoding.as_str());
        block.set(GRPC_ACCEPT_ENCODING, self.config.accept_encoding.as_str());

        metrics::RESPONSES_STARTED.increment();
        if trailers_only {
            self.append_status(&mut block);
            self.state = ResponseState::TrailersSent;
            metrics::RESPONSES_TRAILERS_ONLY.increment();
            debug!(status = %self.status.code(), "sending trailers-only response");
        } else {
            self.state = ResponseState::HeadersSent;
            debug!(encoding = %self.encoding, "sending response headers");
        }

        self.stream.send_headers(block, trailers_only)
    }

    fn send_trailers(&mut self) -> Completion {
        let mut block = Metadata::new();
        self.append_status(&mut block);
        if let Some(pending) = self.trailers.take() {
            self.append_custom(&mut block, &pending, Block::Trailers);
        }

        self.state = ResponseState::TrailersSent;
        debug!(status = %self.status.code(), "sending response trailers");
        self.stream.send_trailers(block)
    }

    fn append_status(&self, block: &mut Metadata) {
        block.set(GRPC_STATUS, self.status.code().header_value());
        if let Some(message) = self.status.message() {
            block.set(GRPC_MESSAGE, status::percent_encode_message(message));
        }
    }

    fn append_custom(&self, block: &mut Metadata, pending: &Metadata, kind: Block) {
        for (key, value) in pending {
            if forwardable(key) {
                block.insert(key, value);
                continue;
            }

            metrics::RESERVED_METADATA_DROPPED.increment();
            if self.config.reserved_metadata == ReservedMetadataPolicy::Log {
                warn!(key, block = kind.as_str(), "dropping reserved response metadata");
            }
        }
    }
}

/// Application keys that may be copied into a header or trailer block.
///
/// Protocol metadata (`grpc-*`) and HTTP/2 pseudo headers are owned by the
/// framer.
fn forwardable(key: &str) -> bool {
    !is_reserved(key) && !key.starts_with(':')
}
