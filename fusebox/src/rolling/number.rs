//! Bucketed event counter over a rolling time window.
//!
//! Transcribed from `hystrix.rolling_number.RollingNumber` (see
//! `original_source/hystrix/rolling_number.py`), re-architected for Rust:
//! per-kind cells are plain atomics instead of mutex-guarded `LongAdder`s,
//! and the window itself is an `RwLock<VecDeque<Arc<Bucket>>>` rather than a
//! `deque` protected end-to-end by a single reentrant lock. The fast path
//! (no rollover) only takes the read lock, matching the "write-optimized,
//! read-light" profile this structure is built for (§5 of the design doc).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::clock::Clock;
use crate::error::{ConfigError, TypeMismatch};
use crate::events::{
    counter_index, max_index, CounterKind, EventKind, MaxKind, COUNTER_KIND_COUNT, MAX_KIND_COUNT,
};

/// One sub-interval of the rolling window. Counts are accumulated by
/// addition, maxes by maximum; both live as fixed-size atomic arrays indexed
/// by the kind's position in its `ALL` slice.
#[derive(Debug)]
pub struct Bucket {
    pub window_start_ms: i64,
    counts: [AtomicI64; COUNTER_KIND_COUNT],
    maxes: [AtomicI64; MAX_KIND_COUNT],
}

impl Bucket {
    fn new(window_start_ms: i64) -> Self {
        Self {
            window_start_ms,
            counts: std::array::from_fn(|_| AtomicI64::new(0)),
            maxes: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }

    fn counter(&self, kind: CounterKind) -> &AtomicI64 {
        &self.counts[counter_index(kind)]
    }

    fn max(&self, kind: MaxKind) -> &AtomicI64 {
        &self.maxes[max_index(kind)]
    }
}

/// Running totals that survive bucket rollover. A bucket is folded in here
/// exactly once, at the moment it stops being the window head.
#[derive(Debug, Default)]
struct CumulativeSum {
    counts: [AtomicI64; COUNTER_KIND_COUNT],
    maxes: [AtomicI64; MAX_KIND_COUNT],
}

impl CumulativeSum {
    fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicI64::new(0)),
            maxes: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }

    fn add_bucket(&self, bucket: &Bucket) {
        for kind in CounterKind::ALL.iter().copied() {
            let delta = bucket.counter(kind).load(Ordering::Relaxed);
            if delta != 0 {
                self.counts[counter_index(kind)].fetch_add(delta, Ordering::Relaxed);
            }
        }
        for kind in MaxKind::ALL.iter().copied() {
            let value = bucket.max(kind).load(Ordering::Relaxed);
            update_max(&self.maxes[max_index(kind)], value);
        }
    }

    fn get_counter(&self, kind: CounterKind) -> i64 {
        self.counts[counter_index(kind)].load(Ordering::Relaxed)
    }
}

fn update_max(cell: &AtomicI64, value: i64) {
    let mut current = cell.load(Ordering::Relaxed);
    while value > current {
        match cell.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

/// A rolling time-window counter: `window_ms` divided into `bucket_count`
/// equal buckets, oldest falling off as time advances.
pub struct RollingNumber {
    clock: Arc<dyn Clock>,
    window_ms: i64,
    bucket_count: usize,
    bucket_width_ms: i64,
    window: RwLock<VecDeque<Arc<Bucket>>>,
    cumulative: CumulativeSum,
}

impl RollingNumber {
    pub fn new(clock: Arc<dyn Clock>, window_ms: i64, bucket_count: usize) -> Result<Self, ConfigError> {
        if bucket_count == 0 || window_ms % (bucket_count as i64) != 0 {
            return Err(ConfigError::IndivisibleWindow { window_ms, bucket_count });
        }
        Ok(Self {
            clock,
            window_ms,
            bucket_count,
            bucket_width_ms: window_ms / bucket_count as i64,
            window: RwLock::new(VecDeque::with_capacity(bucket_count)),
            cumulative: CumulativeSum::new(),
        })
    }

    pub fn bucket_width_ms(&self) -> i64 {
        self.bucket_width_ms
    }

    /// Number of buckets currently live in the ring (never exceeds
    /// `bucket_count`, invariant 3 of the spec's testable properties).
    pub fn live_bucket_count(&self) -> usize {
        let _ = self.current_bucket();
        self.window.read().unwrap().len()
    }

    pub fn increment(&self, kind: CounterKind) {
        self.add(kind, 1);
    }

    pub fn add(&self, kind: CounterKind, n: i64) {
        self.current_bucket().counter(kind).fetch_add(n, Ordering::Relaxed);
    }

    pub fn update_rolling_max(&self, kind: MaxKind, value: i64) {
        update_max(self.current_bucket().max(kind), value);
    }

    /// Dynamic-dispatch counterpart to [`Self::add`] for call sites (e.g. a
    /// notifier callback) that only hold an [`EventKind`] and must validate
    /// the sub-kind at the call site rather than at compile time.
    pub fn add_dyn(&self, kind: EventKind, n: i64) -> Result<(), TypeMismatch> {
        self.add(kind.as_counter()?, n);
        Ok(())
    }

    /// Dynamic-dispatch counterpart to [`Self::increment`].
    pub fn increment_dyn(&self, kind: EventKind) -> Result<(), TypeMismatch> {
        self.add_dyn(kind, 1)
    }

    /// Dynamic-dispatch counterpart to [`Self::update_rolling_max`].
    pub fn update_rolling_max_dyn(&self, kind: EventKind, value: i64) -> Result<(), TypeMismatch> {
        self.update_rolling_max(kind.as_max()?, value);
        Ok(())
    }

    pub fn rolling_sum(&self, kind: CounterKind) -> i64 {
        let _ = self.current_bucket();
        self.window
            .read()
            .unwrap()
            .iter()
            .map(|b| b.counter(kind).load(Ordering::Relaxed))
            .sum()
    }

    pub fn rolling_max(&self, kind: MaxKind) -> i64 {
        let _ = self.current_bucket();
        self.window
            .read()
            .unwrap()
            .iter()
            .map(|b| b.max(kind).load(Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }

    /// Per-bucket counter values, newest first.
    pub fn counter_values(&self, kind: CounterKind) -> Vec<i64> {
        let _ = self.current_bucket();
        self.window
            .read()
            .unwrap()
            .iter()
            .map(|b| b.counter(kind).load(Ordering::Relaxed))
            .collect()
    }

    /// Per-bucket max values, newest first.
    pub fn max_values(&self, kind: MaxKind) -> Vec<i64> {
        let _ = self.current_bucket();
        self.window
            .read()
            .unwrap()
            .iter()
            .map(|b| b.max(kind).load(Ordering::Relaxed))
            .collect()
    }

    pub fn value_of_latest_counter_bucket(&self, kind: CounterKind) -> i64 {
        self.current_bucket().counter(kind).load(Ordering::Relaxed)
    }

    pub fn value_of_latest_max_bucket(&self, kind: MaxKind) -> i64 {
        self.current_bucket().max(kind).load(Ordering::Relaxed)
    }

    pub fn cumulative_sum(&self, kind: CounterKind) -> i64 {
        self.cumulative.get_counter(kind) + self.value_of_latest_counter_bucket(kind)
    }

    /// Retire the current bucket into the cumulative sum and clear the ring.
    /// Does not reset cumulative totals.
    pub fn reset(&self) {
        let mut guard = self.window.write().unwrap();
        self.reset_locked(&mut guard);
    }

    fn reset_locked(&self, guard: &mut VecDeque<Arc<Bucket>>) {
        if let Some(last) = guard.front() {
            self.cumulative.add_bucket(last);
        }
        guard.clear();
    }

    /// Returns the live head bucket, rolling the window forward as needed.
    fn current_bucket(&self) -> Arc<Bucket> {
        let now = self.clock.now_millis();

        // Fast path: no rollover needed, only a read lock is taken.
        if let Some(head) = self.window.read().unwrap().front() {
            if now < head.window_start_ms + self.bucket_width_ms {
                return Arc::clone(head);
            }
        }

        let mut guard = self.window.write().unwrap();
        loop {
            match guard.front().cloned() {
                None => {
                    let bucket = Arc::new(Bucket::new(now));
                    guard.push_front(Arc::clone(&bucket));
                    return bucket;
                }
                Some(head) => {
                    if now < head.window_start_ms + self.bucket_width_ms {
                        return head;
                    }
                    if now - (head.window_start_ms + self.bucket_width_ms) > self.window_ms {
                        self.reset_locked(&mut guard);
                        continue;
                    }
                    let new_start = head.window_start_ms + self.bucket_width_ms;
                    let new_bucket = Arc::new(Bucket::new(new_start));
                    guard.push_front(Arc::clone(&new_bucket));
                    self.cumulative.add_bucket(&head);
                    if guard.len() > self.bucket_count {
                        guard.pop_back();
                    }
                    // Loop again: may need several pushes to catch up to `now`.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn rolling(window_ms: i64, buckets: usize) -> (Arc<MockClock>, RollingNumber) {
        let clock = Arc::new(MockClock::new());
        let rn = RollingNumber::new(clock.clone(), window_ms, buckets).unwrap();
        (clock, rn)
    }

    #[test]
    fn construction_rejects_indivisible_window() {
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new());
        assert!(RollingNumber::new(clock, 1000, 11).is_err());
    }

    // S1 — bucket creation.
    #[test]
    fn s1_bucket_creation_fills_window_then_stays_capped() {
        let (clock, rn) = rolling(200, 10);
        for _ in 0..10 {
            rn.increment(CounterKind::Success);
            clock.increment(20);
        }
        // `clock` is now at 200, exactly `head.window_start_ms + bucket_width_ms`
        // for the 10th bucket, so `live_bucket_count`'s own `current_bucket()`
        // call already rolls a fresh (empty) bucket and evicts the oldest one
        // before `rolling_sum` below reads the ring — 9 of the 10 increments
        // remain live, the 10th having been folded into the cumulative sum.
        assert_eq!(rn.live_bucket_count(), 10);
        assert_eq!(rn.rolling_sum(CounterKind::Success), 9);

        // one more increment lands in the already-rolled (now current) bucket,
        // bringing the live ring back up to 10 while cumulative also grows.
        rn.increment(CounterKind::Success);
        assert_eq!(rn.live_bucket_count(), 10);
        assert_eq!(rn.rolling_sum(CounterKind::Success), 10);
        assert_eq!(rn.cumulative_sum(CounterKind::Success), 11);
    }

    // S2 — empty buckets fill in.
    #[test]
    fn s2_empty_buckets_materialize_on_access() {
        let (clock, rn) = rolling(200, 10);
        rn.increment(CounterKind::Success);
        clock.increment(60);
        rn.increment(CounterKind::Success);

        assert_eq!(rn.live_bucket_count(), 4);
        assert_eq!(rn.rolling_sum(CounterKind::Success), 2);
    }

    // S3 — window rollover resets rolling sum, preserves cumulative.
    #[test]
    fn s3_rollover_resets_rolling_but_preserves_cumulative() {
        let (clock, rn) = rolling(200, 10);
        for _ in 0..5 {
            rn.increment(CounterKind::Success);
        }
        clock.increment(300);
        rn.increment(CounterKind::Success);

        assert_eq!(rn.rolling_sum(CounterKind::Success), 1);
        assert_eq!(rn.cumulative_sum(CounterKind::Success), 6);
    }

    #[test]
    fn invariant_live_bucket_count_never_exceeds_configured() {
        let (clock, rn) = rolling(100, 5);
        for _ in 0..50 {
            rn.increment(CounterKind::Failure);
            clock.increment(7);
            assert!(rn.live_bucket_count() <= 5);
        }
    }

    #[test]
    fn cumulative_sum_is_monotonically_non_decreasing_across_resets() {
        let (clock, rn) = rolling(100, 5);
        let mut last = 0;
        for _ in 0..20 {
            rn.increment(CounterKind::Timeout);
            clock.increment(25);
            let current = rn.cumulative_sum(CounterKind::Timeout);
            assert!(current >= last);
            last = current;
        }
        rn.reset();
        let after_reset = rn.cumulative_sum(CounterKind::Timeout);
        assert!(after_reset >= last);
    }

    #[test]
    fn rolling_max_tracks_the_largest_live_bucket_value() {
        let (clock, rn) = rolling(200, 10);
        rn.update_rolling_max(MaxKind::ThreadMaxActive, 3);
        clock.increment(20);
        rn.update_rolling_max(MaxKind::ThreadMaxActive, 7);
        clock.increment(20);
        rn.update_rolling_max(MaxKind::ThreadMaxActive, 2);

        assert_eq!(rn.rolling_max(MaxKind::ThreadMaxActive), 7);
    }

    #[test]
    fn dyn_dispatch_rejects_mismatched_sub_kind() {
        let (_clock, rn) = rolling(200, 10);
        assert!(rn.increment_dyn(EventKind::Max(MaxKind::ThreadMaxActive)).is_err());
        assert!(rn
            .update_rolling_max_dyn(EventKind::Counter(CounterKind::Success), 5)
            .is_err());
    }

    #[test]
    fn dyn_dispatch_accepts_matching_sub_kind() {
        let (_clock, rn) = rolling(200, 10);
        rn.increment_dyn(EventKind::Counter(CounterKind::Success)).unwrap();
        rn.update_rolling_max_dyn(EventKind::Max(MaxKind::ThreadMaxActive), 9).unwrap();
        assert_eq!(rn.rolling_sum(CounterKind::Success), 1);
        assert_eq!(rn.rolling_max(MaxKind::ThreadMaxActive), 9);
    }
}
