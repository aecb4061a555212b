pub mod bus;
pub mod error;
pub mod frame_tree;
pub mod message;
pub mod sink;
pub mod transform;

pub use bus::{Bus, Clock, MessageCallback, SubscriptionHandle, TickCallback, TimerHandle, Timers};
pub use error::{BusError, FrameTreeError, SinkError};
pub use frame_tree::{FrameLink, FrameTreeSource};
pub use message::Message;
pub use sink::{Outbound, TransportSink};
pub use transform::{Header, Quaternion, TfMessage, Time, Transform, TransformStamped, Vector3};

/// The reserved frame-tree topic. Its messages are snapshotted, never passed through.
pub const FRAME_TREE_TOPIC: &str = "/tf";

/// Latched companion of [`FRAME_TREE_TOPIC`] carrying transforms that never change.
pub const STATIC_FRAME_TREE_TOPIC: &str = "/tf_static";

/// Message type carried on both frame-tree topics.
pub const TF_MESSAGE_TYPE: &str = "tf2_msgs/TFMessage";
