//! In-process frame tree fed from the frame-tree topics.

mod buffer;
mod listener;

pub use buffer::{FrameBuffer, DEFAULT_CACHE_TIME};
pub use listener::{TransformListener, LISTENER_QUEUE_DEPTH, LISTENER_SUFFIX};
