use std::sync::Arc;
use std::time::Duration;

use bridge_api::{
    FrameTreeSource, Message, MessageCallback, Outbound, TransportSink, FRAME_TREE_TOPIC,
};

use crate::delivery::deliver;
use crate::error::RegistrationError;
use crate::receiver::{receiver_name, Receiver, ReceiverRegistry};
use crate::snapshotter::TransformSnapshotter;

/// Suffix appended to the sanitized topic to name a forwarder's receiver.
pub const SUBSCRIBER_SUFFIX: &str = "Subscriber";

/// Default bus delivery queue depth per forwarder.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Exact, case-sensitive match against the reserved frame-tree topic.
pub fn is_frame_tree_topic(topic: &str) -> bool {
    topic == FRAME_TREE_TOPIC
}

/// Shared dependencies for building forwarders.
#[derive(Clone)]
pub struct ForwarderContext {
    pub registry: Arc<ReceiverRegistry>,
    pub sink: Arc<dyn TransportSink>,
    /// Read by the snapshotter of the frame-tree forwarder.
    pub frames: Arc<dyn FrameTreeSource>,
    pub tick_interval: Duration,
}

/// Behavior bound to a forwarder at construction.
#[derive(Debug)]
pub enum Forwarding {
    /// Every message goes to the sink unchanged.
    Passthrough,
    /// Messages are dropped; the snapshotter is the only producer for the topic.
    Snapshotting(TransformSnapshotter),
}

/// Bridges one bus topic to the transport sink.
pub struct TopicForwarder {
    topic: String,
    msg_type: String,
    forwarding: Forwarding,
    receiver: Receiver,
}

impl std::fmt::Debug for TopicForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicForwarder")
            .field("topic", &self.topic)
            .field("msg_type", &self.msg_type)
            .field("forwarding", &self.forwarding)
            .field("receiver", &self.receiver.name())
            .finish()
    }
}

impl TopicForwarder {
    /// Register a receiver for `topic` and subscribe to it.
    ///
    /// The frame-tree topic gets [`Forwarding::Snapshotting`], every other topic
    /// [`Forwarding::Passthrough`]. On error nothing stays registered.
    pub fn new(
        ctx: &ForwarderContext,
        topic: &str,
        msg_type: &str,
        queue_depth: usize,
    ) -> Result<Self, RegistrationError> {
        let receiver = Receiver::register(&ctx.registry, receiver_name(topic, SUBSCRIBER_SUFFIX))?;
        let snapshotting = is_frame_tree_topic(topic);

        let on_message: MessageCallback = if snapshotting {
            let topic = topic.to_string();
            Arc::new(move |_msg: &Message| {
                tracing::trace!(topic = %topic, "frame-tree message left to the snapshotter");
            })
        } else {
            let sink = ctx.sink.clone();
            let topic = topic.to_string();
            Arc::new(move |msg: &Message| {
                deliver(&*sink, &topic, Outbound::Message(msg.clone()));
            })
        };
        receiver.subscribe(topic, msg_type, queue_depth, on_message)?;

        let forwarding = if snapshotting {
            Forwarding::Snapshotting(TransformSnapshotter::start(
                &ctx.registry,
                ctx.frames.clone(),
                ctx.tick_interval,
                ctx.sink.clone(),
                topic,
            ))
        } else {
            Forwarding::Passthrough
        };

        tracing::info!(
            topic = %topic,
            msg_type = %msg_type,
            queue_depth,
            receiver = %receiver.name(),
            snapshotting,
            "forwarder registered"
        );
        Ok(Self {
            topic: topic.to_string(),
            msg_type: msg_type.to_string(),
            forwarding,
            receiver,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn receiver_name(&self) -> &str {
        self.receiver.name()
    }

    pub fn forwarding(&self) -> &Forwarding {
        &self.forwarding
    }

    pub fn is_registered(&self) -> bool {
        self.receiver.is_registered()
    }

    /// Stop snapshots, release the subscription, then the receiver identity.
    ///
    /// Safe to call repeatedly and while a message callback is running; only
    /// the first call has an effect.
    pub fn unregister(&self) {
        if let Forwarding::Snapshotting(snapshotter) = &self.forwarding {
            snapshotter.stop();
        }
        if self.receiver.unregister() {
            tracing::info!(topic = %self.topic, "forwarder unregistered");
        }
    }
}
