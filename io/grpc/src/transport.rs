//! The HTTP/2 stream a response is written to.

use crate::completion::Completion;
use crate::metadata::Metadata;

use bytes::Bytes;
use std::io;

/// Handler invoked when the transport's write queue drains.
pub type DrainHandler = Box<dyn FnMut() + Send>;

/// Handler invoked on a transport-level failure of the stream.
pub type ExceptionHandler = Box<dyn FnMut(&io::Error) + Send>;

/// Outbound half of a single HTTP/2 stream.
///
/// Implementations own frame transmission, HPACK, and flow control. Sends
/// must be accepted in call order: bytes handed over by one call reach the
/// peer before bytes from any later call. Every send returns a
/// [`Completion`] that resolves once the transport has accepted the data.
pub trait TransportStream {
    /// Send the response header block. `end_stream` closes the stream for
    /// writing (a trailers-only response).
    fn send_headers(&mut self, headers: Metadata, end_stream: bool) -> Completion;

    /// Send body bytes as DATA.
    fn send_data(&mut self, data: Bytes, end_stream: bool) -> Completion;

    /// Send the trailer block and close the stream for writing.
    fn send_trailers(&mut self, trailers: Metadata) -> Completion;

    /// Abort the stream (RST_STREAM).
    fn reset(&mut self);

    /// Whether the write queue is above its high water mark.
    fn write_queue_full(&self) -> bool;

    /// Set the write queue high water mark, in bytes.
    fn set_write_queue_max_size(&mut self, max_size: usize);

    /// Register a handler for when a full write queue drains.
    fn on_drain(&mut self, handler: DrainHandler);

    /// Register a handler for transport-level failures.
    fn on_exception(&mut self, handler: ExceptionHandler);
}
