//! Response metrics.

use metriken::{Counter, metric};

#[metric(
    name = "grpc_responses_started",
    description = "Responses that sent their header block"
)]
pub static RESPONSES_STARTED: Counter = Counter::new();

#[metric(
    name = "grpc_responses_trailers_only",
    description = "Responses that ended with the status folded into headers"
)]
pub static RESPONSES_TRAILERS_ONLY: Counter = Counter::new();

#[metric(
    name = "grpc_responses_reset",
    description = "Responses aborted with a stream reset"
)]
pub static RESPONSES_RESET: Counter = Counter::new();

#[metric(name = "grpc_messages_sent", description = "Message frames written")]
pub static MESSAGES_SENT: Counter = Counter::new();

#[metric(
    name = "grpc_message_bytes_sent",
    description = "Bytes of message frames written, prefix included"
)]
pub static MESSAGE_BYTES_SENT: Counter = Counter::new();

#[metric(
    name = "grpc_reserved_metadata_dropped",
    description = "Application headers or trailers dropped for using the grpc- prefix"
)]
pub static RESERVED_METADATA_DROPPED: Counter = Counter::new();
