use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bridge_api::{TickCallback, TimerHandle, Timers};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::sync::lock;

/// Shortest period a timer is allowed to run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Recurring timers backed by tokio tasks.
///
/// The first fire happens one interval after creation. The callback runs
/// inside the timer task, so fires of one timer never overlap; a slow
/// callback delays the following fires instead of bunching them.
pub struct TokioTimers {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl std::fmt::Debug for TokioTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTimers")
            .field("active", &self.active())
            .finish()
    }
}

impl TokioTimers {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn active(&self) -> usize {
        lock(&self.tasks, "timer tasks").len()
    }
}

impl Timers for TokioTimers {
    fn create_recurring_timer(&self, interval: Duration, mut on_tick: TickCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let period = interval.max(MIN_INTERVAL);

        let task = self.runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if panic::catch_unwind(AssertUnwindSafe(|| on_tick())).is_err() {
                    tracing::error!(timer = id, "timer callback panicked");
                }
            }
        });
        lock(&self.tasks, "timer tasks").insert(id, task);
        tracing::debug!(timer = id, ?period, "timer created");
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.tasks, "timer tasks").remove(&handle.0) {
            task.abort();
            tracing::debug!(timer = handle.0, "timer cancelled");
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks, "timer tasks").drain() {
            task.abort();
        }
    }
}
