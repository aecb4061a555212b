use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_api::{
    Clock, FrameTreeError, FrameTreeSource, Outbound, TfMessage, TimerHandle, Timers,
    TransformStamped, TransportSink,
};

use crate::delivery::deliver;
use crate::receiver::ReceiverRegistry;
use crate::sync::lock;

/// Default period between two snapshots.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

struct SnapshotRoutine {
    frames: Arc<dyn FrameTreeSource>,
    sink: Arc<dyn TransportSink>,
    clock: Arc<dyn Clock>,
    topic: String,
}

impl SnapshotRoutine {
    /// Resolve every known frame against its parent under one shared stamp.
    ///
    /// Unresolvable pairs are left out; only a failure to enumerate the tree is an error.
    fn capture(&self) -> Result<(TfMessage, usize), FrameTreeError> {
        let links = self.frames.describe_all_frames()?;
        let stamp = self.clock.now();

        let mut skipped = 0;
        let mut transforms = Vec::with_capacity(links.len());
        for link in links {
            match self.frames.lookup_transform(&link.parent, &link.child) {
                Ok(transform) => transforms.push(TransformStamped::new(
                    link.parent,
                    link.child,
                    stamp,
                    transform,
                )),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        topic = %self.topic,
                        parent = %link.parent,
                        child = %link.child,
                        error = %e,
                        "could not transform frame, skipping"
                    );
                }
            }
        }
        Ok((TfMessage { transforms }, skipped))
    }

    fn tick(&self) {
        let (batch, skipped) = match self.capture() {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(topic = %self.topic, error = %e, "frame tree unreadable, skipping tick");
                return;
            }
        };
        tracing::debug!(
            topic = %self.topic,
            transforms = batch.transforms.len(),
            skipped,
            "sending frame snapshot"
        );
        deliver(&*self.sink, &self.topic, Outbound::Snapshot(batch));
    }
}

/// Periodically flattens the frame tree into one stamped batch and sends it.
///
/// Holds no state across ticks; the recurring timer is cancelled by
/// [`TransformSnapshotter::stop`] or on drop.
pub struct TransformSnapshotter {
    routine: Arc<SnapshotRoutine>,
    timers: Arc<dyn Timers>,
    interval: Duration,
    timer: Mutex<Option<TimerHandle>>,
}

impl std::fmt::Debug for TransformSnapshotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSnapshotter")
            .field("topic", &self.routine.topic)
            .field("interval", &self.interval)
            .finish()
    }
}

impl TransformSnapshotter {
    /// Start the recurring snapshot timer.
    pub fn start(
        registry: &ReceiverRegistry,
        frames: Arc<dyn FrameTreeSource>,
        interval: Duration,
        sink: Arc<dyn TransportSink>,
        topic: impl Into<String>,
    ) -> Self {
        let routine = Arc::new(SnapshotRoutine {
            frames,
            sink,
            clock: registry.clock().clone(),
            topic: topic.into(),
        });
        let timers = registry.timers().clone();

        let on_tick = routine.clone();
        let handle = timers.create_recurring_timer(interval, Box::new(move || on_tick.tick()));
        tracing::info!(topic = %routine.topic, ?interval, "frame snapshots scheduled");

        Self {
            routine,
            timers,
            interval,
            timer: Mutex::new(Some(handle)),
        }
    }

    /// Run one snapshot now. Never fails; problems are logged.
    pub fn on_tick(&self) {
        self.routine.tick();
    }

    pub fn topic(&self) -> &str {
        &self.routine.topic
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer, "snapshot timer").is_some()
    }

    /// Cancel the timer. Returns `false` if it was already stopped.
    pub fn stop(&self) -> bool {
        match lock(&self.timer, "snapshot timer").take() {
            Some(handle) => {
                self.timers.cancel(handle);
                tracing::info!(topic = %self.routine.topic, "frame snapshots stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for TransformSnapshotter {
    fn drop(&mut self) {
        self.stop();
    }
}
