use serde::Serialize;

use crate::error::SinkError;
use crate::message::Message;
use crate::transform::TfMessage;

/// Payload handed to the transport sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Outbound {
    /// A bus message forwarded untouched.
    Message(Message),
    /// A frame-tree snapshot batch.
    Snapshot(TfMessage),
}

/// Outbound connection to the remote endpoint.
///
/// Fire-and-forget: callers do not retry, and delivery guarantees belong to
/// the implementation. Must be safe for concurrent callers and must not block
/// on network I/O.
pub trait TransportSink: Send + Sync {
    fn send_message(&self, topic: &str, payload: Outbound) -> Result<(), SinkError>;
}
