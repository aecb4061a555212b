use std::time::{SystemTime, UNIX_EPOCH};

use bridge_api::{Clock, Time};

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Time::from_nanos(i64::try_from(since_epoch.as_nanos()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_recent_and_monotone_enough() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        // 2020-01-01T00:00:00Z
        assert!(a.sec > 1_577_836_800);
        assert!(b >= a);
        assert!(a.nanosec < 1_000_000_000);
    }
}
