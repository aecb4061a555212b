//! In-crate test doubles for the host collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_api::{
    Bus, BusError, Clock, FrameLink, FrameTreeError, FrameTreeSource, Message, MessageCallback,
    Outbound, SinkError, SubscriptionHandle, TfMessage, TickCallback, Time, TimerHandle, Timers,
    Transform, TransportSink,
};

use crate::receiver::ReceiverRegistry;

pub(crate) fn registry() -> (Arc<ReceiverRegistry>, Arc<ManualBus>) {
    let (reg, bus, _timers, _clock) = registry_parts();
    (reg, bus)
}

pub(crate) fn registry_parts() -> (
    Arc<ReceiverRegistry>,
    Arc<ManualBus>,
    Arc<ManualTimers>,
    Arc<FixedClock>,
) {
    let bus = Arc::new(ManualBus::default());
    let timers = Arc::new(ManualTimers::default());
    let clock = Arc::new(FixedClock::new(Time::new(100, 0)));
    let reg = Arc::new(ReceiverRegistry::new(bus.clone(), timers.clone(), clock.clone()));
    (reg, bus, timers, clock)
}

// ---------------------------------------------------------------------------
// ManualBus: callbacks run synchronously from `deliver`
// ---------------------------------------------------------------------------

struct ManualSubscription {
    topic: String,
    msg_type: String,
    queue_depth: usize,
    callback: MessageCallback,
}

#[derive(Default)]
pub(crate) struct ManualBus {
    next_id: AtomicU64,
    subs: Mutex<HashMap<u64, ManualSubscription>>,
    rejected: Mutex<HashSet<String>>,
    unsubscribes: AtomicUsize,
}

impl ManualBus {
    pub(crate) fn reject_type(&self, msg_type: &str) {
        self.rejected.lock().unwrap().insert(msg_type.to_string());
    }

    /// Run every callback subscribed to `topic`; returns how many ran.
    pub(crate) fn deliver(&self, topic: &str, message: &Message) -> usize {
        let callbacks: Vec<MessageCallback> = self
            .subs
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.topic == topic)
            .map(|s| s.callback.clone())
            .collect();
        for cb in &callbacks {
            cb(message);
        }
        callbacks.len()
    }

    pub(crate) fn active_subscriptions(&self) -> usize {
        self.subs.lock().unwrap().len()
    }

    pub(crate) fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// `(msg_type, queue_depth)` of every subscription on `topic`.
    pub(crate) fn subscriptions_on(&self, topic: &str) -> Vec<(String, usize)> {
        self.subs
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.topic == topic)
            .map(|s| (s.msg_type.clone(), s.queue_depth))
            .collect()
    }
}

impl Bus for ManualBus {
    fn subscribe(
        &self,
        topic: &str,
        msg_type: &str,
        queue_depth: usize,
        on_message: MessageCallback,
    ) -> Result<SubscriptionHandle, BusError> {
        if self.rejected.lock().unwrap().contains(msg_type) {
            return Err(BusError::UnknownMessageType(msg_type.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subs.lock().unwrap().insert(
            id,
            ManualSubscription {
                topic: topic.to_string(),
                msg_type: msg_type.to_string(),
                queue_depth,
                callback: on_message,
            },
        );
        Ok(SubscriptionHandle(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        match self.subs.lock().unwrap().remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(BusError::NotSubscribed(handle.0)),
        }
    }
}

// ---------------------------------------------------------------------------
// ManualTimers: fired explicitly by the test
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct ManualTimers {
    next_id: AtomicU64,
    timers: Mutex<HashMap<u64, (Duration, Option<TickCallback>)>>,
}

impl ManualTimers {
    pub(crate) fn fire_all(&self) {
        let ids: Vec<u64> = self.timers.lock().unwrap().keys().copied().collect();
        for id in ids {
            let cb = self
                .timers
                .lock()
                .unwrap()
                .get_mut(&id)
                .and_then(|(_, cb)| cb.take());
            if let Some(mut cb) = cb {
                cb();
                if let Some((_, slot)) = self.timers.lock().unwrap().get_mut(&id) {
                    *slot = Some(cb);
                }
            }
        }
    }

    pub(crate) fn intervals(&self) -> Vec<Duration> {
        self.timers.lock().unwrap().values().map(|(d, _)| *d).collect()
    }
}

impl Timers for ManualTimers {
    fn create_recurring_timer(&self, interval: Duration, on_tick: TickCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.timers
            .lock()
            .unwrap()
            .insert(id, (interval, Some(on_tick)));
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers.lock().unwrap().remove(&handle.0);
    }
}

// ---------------------------------------------------------------------------
// FixedClock
// ---------------------------------------------------------------------------

pub(crate) struct FixedClock {
    now: Mutex<Time>,
}

impl FixedClock {
    pub(crate) fn new(now: Time) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub(crate) fn set(&self, now: Time) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Time {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum SinkMode {
    Accept,
    Reject,
    Panic,
}

pub(crate) struct RecordingSink {
    mode: Mutex<SinkMode>,
    calls: Mutex<Vec<(String, Outbound)>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_mode(SinkMode::Accept)
    }

    pub(crate) fn with_mode(mode: SinkMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_mode(&self, mode: SinkMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub(crate) fn calls(&self) -> Vec<(String, Outbound)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn snapshots(&self) -> Vec<TfMessage> {
        self.calls()
            .into_iter()
            .filter_map(|(_, out)| match out {
                Outbound::Snapshot(batch) => Some(batch),
                Outbound::Message(_) => None,
            })
            .collect()
    }
}

impl TransportSink for RecordingSink {
    fn send_message(&self, topic: &str, payload: Outbound) -> Result<(), SinkError> {
        let mode = *self.mode.lock().unwrap();
        self.calls.lock().unwrap().push((topic.to_string(), payload));
        match mode {
            SinkMode::Accept => Ok(()),
            SinkMode::Reject => Err(SinkError::Closed),
            SinkMode::Panic => panic!("sink exploded"),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticFrames
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct StaticFrames {
    links: Vec<FrameLink>,
    transforms: HashMap<(String, String), Transform>,
    broken: Mutex<HashSet<(String, String)>>,
    unavailable: Mutex<bool>,
}

impl StaticFrames {
    /// Add `child` under `parent` with a resolvable transform.
    pub(crate) fn link(mut self, child: &str, parent: &str, transform: Transform) -> Self {
        self.links.push(FrameLink::new(child, parent));
        self.transforms
            .insert((parent.to_string(), child.to_string()), transform);
        self
    }

    /// Make `lookup_transform(parent, child)` fail.
    pub(crate) fn break_link(&self, child: &str, parent: &str) {
        self.broken
            .lock()
            .unwrap()
            .insert((parent.to_string(), child.to_string()));
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

impl FrameTreeSource for StaticFrames {
    fn describe_all_frames(&self) -> Result<Vec<FrameLink>, FrameTreeError> {
        if *self.unavailable.lock().unwrap() {
            return Err(FrameTreeError::FrameTreeUnavailable("buffer offline".into()));
        }
        Ok(self.links.clone())
    }

    fn lookup_transform(&self, parent: &str, child: &str) -> Result<Transform, FrameTreeError> {
        let key = (parent.to_string(), child.to_string());
        if self.broken.lock().unwrap().contains(&key) {
            return Err(FrameTreeError::transform_unavailable(parent, child, "chain broken"));
        }
        self.transforms
            .get(&key)
            .copied()
            .ok_or_else(|| FrameTreeError::transform_unavailable(parent, child, "unknown frame"))
    }
}

// ---------------------------------------------------------------------------
// CapturedEvents: tracing layer that records events with their fields
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) struct CapturedEvent {
    pub(crate) level: tracing::Level,
    pub(crate) fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Default)]
pub(crate) struct CapturedEvents(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedEvents {
    /// Run `f` with a subscriber that records into `self`.
    pub(crate) fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        use tracing_subscriber::layer::SubscriberExt;
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub(crate) fn at_level(&self, level: tracing::Level) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

struct FieldRecorder<'a>(&'a mut HashMap<String, String>);

impl tracing::field::Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CapturedEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldRecorder(&mut fields));
        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields,
        });
    }
}
