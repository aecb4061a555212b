//! Topic forwarding engine: bus subscriptions in, transport payloads out.
//!
//! Every configured topic gets a [`TopicForwarder`]. The frame-tree topic is
//! not forwarded message by message; its forwarder owns a
//! [`TransformSnapshotter`] that periodically sends the whole tree instead.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod frames;
pub mod receiver;
pub mod runtime;
pub mod snapshotter;
pub mod transport;

mod delivery;
mod sync;

#[cfg(test)]
mod testing;

pub use bootstrap::{Bridge, Collaborators};
pub use config::BridgeConfig;
pub use error::{EngineError, RegistrationError};
pub use forwarder::{ForwarderContext, Forwarding, TopicForwarder};
pub use frames::{FrameBuffer, TransformListener};
pub use receiver::{Receiver, ReceiverRegistry};
pub use runtime::{LocalBus, SystemClock, TokioTimers};
pub use snapshotter::TransformSnapshotter;
pub use transport::TcpSink;
