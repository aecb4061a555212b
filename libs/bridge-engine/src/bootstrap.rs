use std::sync::Arc;

use bridge_api::{Bus, Clock, Timers, TransportSink};

use crate::config::BridgeConfig;
use crate::error::EngineError;
use crate::forwarder::{is_frame_tree_topic, ForwarderContext, TopicForwarder};
use crate::frames::{FrameBuffer, TransformListener};
use crate::receiver::ReceiverRegistry;

/// Host services the bridge runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub bus: Arc<dyn Bus>,
    pub timers: Arc<dyn Timers>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn TransportSink>,
}

/// The running bridge, one forwarder per configured topic.
pub struct Bridge {
    registry: Arc<ReceiverRegistry>,
    listener: Option<TransformListener>,
    forwarders: Vec<TopicForwarder>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("listener", &self.listener)
            .field("forwarders", &self.forwarders)
            .finish()
    }
}

impl Bridge {
    /// Build every forwarder named by `config`.
    ///
    /// When the frame-tree topic is configured, a [`FrameBuffer`] fed by a
    /// [`TransformListener`] backs its snapshotter. If any step fails,
    /// everything registered so far is released before the error is returned.
    pub fn bootstrap(config: &BridgeConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        config.validate()?;
        let Collaborators {
            bus,
            timers,
            clock,
            sink,
        } = collaborators;

        let registry = Arc::new(ReceiverRegistry::new(bus, timers, clock));
        let frames = Arc::new(FrameBuffer::new(config.cache_time()));
        let mut bridge = Bridge {
            registry: registry.clone(),
            listener: None,
            forwarders: Vec::with_capacity(config.topics.len()),
        };

        // --- 1. Frame tree, only when someone asks for snapshots ---
        if config.topics.iter().any(|t| is_frame_tree_topic(&t.name)) {
            match TransformListener::start(&registry, frames.clone()) {
                Ok(listener) => bridge.listener = Some(listener),
                Err(e) => {
                    bridge.shutdown();
                    return Err(e.into());
                }
            }
        }

        // --- 2. Forwarders ---
        let ctx = ForwarderContext {
            registry,
            sink,
            frames,
            tick_interval: config.tick_interval(),
        };
        for topic in &config.topics {
            match TopicForwarder::new(&ctx, &topic.name, &topic.msg_type, topic.queue_depth) {
                Ok(forwarder) => bridge.forwarders.push(forwarder),
                Err(e) => {
                    tracing::error!(topic = %topic.name, error = %e, "forwarder failed, rolling back");
                    bridge.shutdown();
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            forwarders = bridge.forwarders.len(),
            frame_tree = bridge.listener.is_some(),
            "bridge ready"
        );
        Ok(bridge)
    }

    pub fn registry(&self) -> &Arc<ReceiverRegistry> {
        &self.registry
    }

    pub fn forwarders(&self) -> &[TopicForwarder] {
        &self.forwarders
    }

    pub fn forwarder(&self, topic: &str) -> Option<&TopicForwarder> {
        self.forwarders.iter().find(|f| f.topic() == topic)
    }

    /// Frame buffer behind the snapshotter, when the frame tree is bridged.
    pub fn frames(&self) -> Option<&Arc<FrameBuffer>> {
        self.listener.as_ref().map(|l| l.buffer())
    }

    /// Unregister every forwarder, then the transform listener. Idempotent.
    pub fn shutdown(&self) {
        for forwarder in self.forwarders.iter().rev() {
            forwarder.unregister();
        }
        if let Some(listener) = &self.listener {
            listener.unregister();
        }
        tracing::info!("bridge shut down");
    }
}
