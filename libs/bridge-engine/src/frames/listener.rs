use std::sync::Arc;

use bridge_api::{
    Message, MessageCallback, TfMessage, FRAME_TREE_TOPIC, STATIC_FRAME_TREE_TOPIC,
    TF_MESSAGE_TYPE,
};

use super::FrameBuffer;
use crate::error::RegistrationError;
use crate::receiver::{receiver_name, Receiver, ReceiverRegistry};

pub const LISTENER_SUFFIX: &str = "TransformListener";

/// Queue depth of the frame-tree subscriptions.
pub const LISTENER_QUEUE_DEPTH: usize = 100;

/// Keeps a [`FrameBuffer`] filled from `/tf` and `/tf_static`.
pub struct TransformListener {
    receiver: Receiver,
    buffer: Arc<FrameBuffer>,
}

impl std::fmt::Debug for TransformListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformListener")
            .field("receiver", &self.receiver.name())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl TransformListener {
    pub fn start(
        registry: &Arc<ReceiverRegistry>,
        buffer: Arc<FrameBuffer>,
    ) -> Result<Self, RegistrationError> {
        let receiver = Receiver::register(registry, receiver_name(FRAME_TREE_TOPIC, LISTENER_SUFFIX))?;
        for (topic, is_static) in [(FRAME_TREE_TOPIC, false), (STATIC_FRAME_TREE_TOPIC, true)] {
            receiver.subscribe(
                topic,
                TF_MESSAGE_TYPE,
                LISTENER_QUEUE_DEPTH,
                ingest(buffer.clone(), topic, is_static),
            )?;
        }
        tracing::info!(receiver = %receiver.name(), "transform listener started");
        Ok(Self { receiver, buffer })
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    pub fn is_registered(&self) -> bool {
        self.receiver.is_registered()
    }

    pub fn unregister(&self) -> bool {
        self.receiver.unregister()
    }
}

fn ingest(buffer: Arc<FrameBuffer>, topic: &'static str, is_static: bool) -> MessageCallback {
    Arc::new(move |msg: &Message| match msg.decode_json::<TfMessage>() {
        Ok(tf) => {
            let stored = buffer.insert_message(&tf, is_static);
            tracing::trace!(topic, stored, "frame-tree update");
        }
        Err(e) => tracing::warn!(topic, error = %e, "undecodable frame-tree message"),
    })
}
