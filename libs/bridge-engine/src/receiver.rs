use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use bridge_api::{Bus, Clock, MessageCallback, SubscriptionHandle, Timers};

use crate::error::RegistrationError;
use crate::sync::lock;

/// Derive a receiver identity from a topic name.
///
/// Every character outside `[A-Za-z0-9_]` is dropped and `_<suffix>` appended,
/// so `"/robot/odom#1"` with suffix `Subscriber` becomes `"robotodom1_Subscriber"`.
pub fn receiver_name(topic: &str, suffix: &str) -> String {
    let stripped: String = topic
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("{stripped}_{suffix}")
}

// ---------------------------------------------------------------------------
// ReceiverRegistry
// ---------------------------------------------------------------------------

/// Process-wide registry of active receivers plus the host services they use.
///
/// Passed explicitly to every constructor; nothing here is global.
pub struct ReceiverRegistry {
    bus: Arc<dyn Bus>,
    timers: Arc<dyn Timers>,
    clock: Arc<dyn Clock>,
    names: Mutex<BTreeSet<String>>,
}

impl std::fmt::Debug for ReceiverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverRegistry")
            .field("names", &self.active_receivers())
            .finish()
    }
}

impl ReceiverRegistry {
    pub fn new(bus: Arc<dyn Bus>, timers: Arc<dyn Timers>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bus,
            timers,
            clock,
            names: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    pub fn timers(&self) -> &Arc<dyn Timers> {
        &self.timers
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Names of all registered receivers, sorted.
    pub fn active_receivers(&self) -> Vec<String> {
        lock(&self.names, "receiver names").iter().cloned().collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        lock(&self.names, "receiver names").contains(name)
    }

    fn claim(&self, name: &str) -> Result<(), RegistrationError> {
        let mut names = lock(&self.names, "receiver names");
        if !names.insert(name.to_string()) {
            return Err(RegistrationError::NameCollision(name.to_string()));
        }
        Ok(())
    }

    fn release(&self, name: &str) {
        lock(&self.names, "receiver names").remove(name);
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

struct ReceiverState {
    registered: bool,
    subscriptions: Vec<SubscriptionHandle>,
}

/// A named participant on the bus that owns its subscriptions.
///
/// Dropping a receiver unregisters it.
pub struct Receiver {
    name: String,
    registry: Arc<ReceiverRegistry>,
    state: Mutex<ReceiverState>,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver").field("name", &self.name).finish()
    }
}

impl Receiver {
    /// Claim `name` in the registry.
    pub fn register(
        registry: &Arc<ReceiverRegistry>,
        name: impl Into<String>,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        registry.claim(&name)?;
        Ok(Self {
            name,
            registry: registry.clone(),
            state: Mutex::new(ReceiverState {
                registered: true,
                subscriptions: Vec::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ReceiverRegistry> {
        &self.registry
    }

    pub fn is_registered(&self) -> bool {
        lock(&self.state, "receiver state").registered
    }

    /// Subscribe on behalf of this receiver. The subscription is released by [`Receiver::unregister`].
    pub fn subscribe(
        &self,
        topic: &str,
        msg_type: &str,
        queue_depth: usize,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, RegistrationError> {
        let mut state = lock(&self.state, "receiver state");
        if !state.registered {
            return Err(RegistrationError::Subscribe {
                topic: topic.to_string(),
                msg_type: msg_type.to_string(),
                source: bridge_api::BusError::Closed,
            });
        }
        let handle = self
            .registry
            .bus
            .subscribe(topic, msg_type, queue_depth, on_message)
            .map_err(|source| RegistrationError::Subscribe {
                topic: topic.to_string(),
                msg_type: msg_type.to_string(),
                source,
            })?;
        state.subscriptions.push(handle);
        Ok(handle)
    }

    /// Release every subscription, then the receiver identity.
    ///
    /// Returns `false` when the receiver was already unregistered.
    pub fn unregister(&self) -> bool {
        let mut state = lock(&self.state, "receiver state");
        if !state.registered {
            return false;
        }
        state.registered = false;
        for handle in state.subscriptions.drain(..) {
            if let Err(e) = self.registry.bus.unsubscribe(handle) {
                tracing::warn!(receiver = %self.name, error = %e, "unsubscribe failed");
            }
        }
        self.registry.release(&self.name);
        tracing::debug!(receiver = %self.name, "receiver unregistered");
        true
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.unregister();
    }
}
