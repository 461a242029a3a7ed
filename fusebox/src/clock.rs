//! Monotonic millisecond time source, injectable so rolling windows can be
//! driven deterministically in tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Current time in milliseconds, monotonically non-decreasing.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Production clock backed by the platform monotonic clock.
#[derive(Debug, Default)]
pub struct SystemClock {
    start: once_start::Start,
}

mod once_start {
    use super::Instant;
    use std::sync::OnceLock;

    #[derive(Debug, Default)]
    pub struct Start(OnceLock<Instant>);

    impl Start {
        pub fn get(&self) -> Instant {
            *self.0.get_or_init(Instant::now)
        }
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        self.start.get().elapsed().as_millis() as i64
    }
}

/// Test clock that only advances when told to. Starts at 0.
#[derive(Debug, Default)]
pub struct MockClock {
    millis: AtomicI64,
}

impl MockClock {
    pub fn new() -> Self {
        Self { millis: AtomicI64::new(0) }
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn increment(&self, delta_ms: i64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_starts_at_zero_and_advances() {
        let clock = MockClock::new();
        assert_eq!(clock.now_millis(), 0);
        clock.increment(20);
        clock.increment(5);
        assert_eq!(clock.now_millis(), 25);
        clock.set(100);
        assert_eq!(clock.now_millis(), 100);
    }

    #[test]
    fn system_clock_is_monotonic_non_decreasing() {
        let clock = SystemClock::default();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
