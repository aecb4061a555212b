use std::sync::Arc;
use std::time::Duration;

use crate::error::BusError;
use crate::message::Message;
use crate::transform::Time;

/// Callback invoked by the bus for each delivered message.
///
/// Calls for one subscription are serialized by the bus; calls for different
/// subscriptions may run concurrently.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Callback invoked on every timer fire. Fires of one timer never overlap.
pub type TickCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Publish/subscribe middleware.
pub trait Bus: Send + Sync {
    /// Subscribe to `topic` with a delivery queue of `queue_depth` messages.
    ///
    /// When the queue is full the oldest undelivered message is dropped.
    fn subscribe(
        &self,
        topic: &str,
        msg_type: &str,
        queue_depth: usize,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, BusError>;

    /// Stop delivery. A callback already running may still complete.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), BusError>;
}

/// Recurring timer service.
pub trait Timers: Send + Sync {
    fn create_recurring_timer(&self, interval: Duration, on_tick: TickCallback) -> TimerHandle;

    /// Cancelling an unknown or already cancelled timer is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

/// Source of wall-clock stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Time;
}
