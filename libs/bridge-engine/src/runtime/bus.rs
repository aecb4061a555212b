use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bridge_api::{Bus, BusError, Message, MessageCallback, SubscriptionHandle};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::sync::lock;

/// `package/Name`, both parts made of `[A-Za-z0-9_]`.
pub fn is_valid_msg_type(msg_type: &str) -> bool {
    let valid_part =
        |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    match msg_type.split_once('/') {
        Some((package, name)) => valid_part(package) && valid_part(name),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Delivery queue: bounded, drops the oldest message on overflow
// ---------------------------------------------------------------------------

// Not `tokio::sync::broadcast`: it rounds capacity up to a power of two, so
// `queue_depth` would not be exact.
struct DeliveryQueue {
    depth: usize,
    items: Mutex<VecDeque<Message>>,
    notify: Notify,
    closed: AtomicBool,
}

impl DeliveryQueue {
    fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            items: Mutex::new(VecDeque::with_capacity(depth.max(1))),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns `true` when an older message had to be dropped.
    fn push(&self, message: Message) -> bool {
        let mut items = lock(&self.items, "delivery queue");
        let dropped = if items.len() >= self.depth {
            items.pop_front();
            true
        } else {
            false
        };
        items.push_back(message);
        drop(items);
        self.notify.notify_one();
        dropped
    }

    fn pop(&self) -> Option<Message> {
        lock(&self.items, "delivery queue").pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.items, "delivery queue").clear();
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn dispatch(topic: String, queue: Arc<DeliveryQueue>, callback: MessageCallback) {
    loop {
        if queue.is_closed() {
            break;
        }
        match queue.pop() {
            Some(message) => {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(&message))).is_err() {
                    tracing::error!(topic = %topic, "subscriber callback panicked");
                }
            }
            None => queue.notify.notified().await,
        }
    }
    tracing::trace!(topic = %topic, "dispatcher stopped");
}

// ---------------------------------------------------------------------------
// LocalBus
// ---------------------------------------------------------------------------

struct LocalSubscription {
    topic: String,
    queue: Arc<DeliveryQueue>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscriptions: HashMap<u64, LocalSubscription>,
    /// Message type of each topic, fixed by its first user.
    topic_types: HashMap<String, String>,
}

impl BusState {
    fn bind_type(&mut self, topic: &str, msg_type: &str) -> Result<(), BusError> {
        if !is_valid_msg_type(msg_type) {
            return Err(BusError::UnknownMessageType(msg_type.to_string()));
        }
        match self.topic_types.get(topic) {
            Some(expected) if expected != msg_type => Err(BusError::TypeMismatch {
                topic: topic.to_string(),
                expected: expected.clone(),
                actual: msg_type.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.topic_types.insert(topic.to_string(), msg_type.to_string());
                Ok(())
            }
        }
    }
}

/// In-process publish/subscribe bus.
///
/// Each subscription owns a bounded queue drained by its own dispatcher task,
/// so callbacks of one subscription never run concurrently.
pub struct LocalBus {
    runtime: Handle,
    state: Mutex<BusState>,
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state, "bus state");
        f.debug_struct("LocalBus")
            .field("topics", &state.topic_types.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

impl LocalBus {
    /// Dispatcher tasks are spawned on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            state: Mutex::new(BusState::default()),
        }
    }

    /// Queue `message` for every subscriber of `topic`.
    ///
    /// Returns the number of subscriptions it was queued for.
    pub fn publish(&self, topic: &str, message: Message) -> Result<usize, BusError> {
        let mut state = lock(&self.state, "bus state");
        state.bind_type(topic, message.msg_type())?;

        let mut queued = 0;
        for sub in state.subscriptions.values().filter(|s| s.topic == topic) {
            if sub.queue.push(message.clone()) {
                tracing::warn!(topic = %topic, depth = sub.queue.depth, "subscriber queue full, dropped oldest message");
            }
            queued += 1;
        }
        Ok(queued)
    }

    /// Message type bound to `topic`, if any.
    pub fn topic_type(&self, topic: &str) -> Option<String> {
        lock(&self.state, "bus state").topic_types.get(topic).cloned()
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.state, "bus state").subscriptions.len()
    }
}

impl Bus for LocalBus {
    fn subscribe(
        &self,
        topic: &str,
        msg_type: &str,
        queue_depth: usize,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, BusError> {
        let mut state = lock(&self.state, "bus state");
        state.bind_type(topic, msg_type)?;

        let queue = Arc::new(DeliveryQueue::new(queue_depth));
        self.runtime
            .spawn(dispatch(topic.to_string(), queue.clone(), on_message));

        let id = state.next_id;
        state.next_id += 1;
        state.subscriptions.insert(
            id,
            LocalSubscription {
                topic: topic.to_string(),
                queue,
            },
        );
        tracing::debug!(topic = %topic, msg_type = %msg_type, queue_depth, id, "subscribed");
        Ok(SubscriptionHandle(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        let sub = lock(&self.state, "bus state")
            .subscriptions
            .remove(&handle.0)
            .ok_or(BusError::NotSubscribed(handle.0))?;
        sub.queue.close();
        tracing::debug!(topic = %sub.topic, id = handle.0, "unsubscribed");
        Ok(())
    }
}

impl Drop for LocalBus {
    fn drop(&mut self) {
        let state = lock(&self.state, "bus state");
        for sub in state.subscriptions.values() {
            sub.queue.close();
        }
    }
}
