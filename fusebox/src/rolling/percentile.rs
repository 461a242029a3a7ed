//! Bucketed latency-sample histogram with percentile/mean computation from a
//! sorted snapshot, transcribed from `hystrix.rolling_percentile` (see
//! `original_source/hystrix/rolling_percentile.py`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::clock::Clock;
use crate::error::ConfigError;

/// Fixed-capacity ring of recent latency samples for one bucket. Writes
/// beyond capacity wrap around and overwrite the oldest sample, so the
/// bucket always holds the *most recent* `capacity` values.
struct PercentileBucket {
    window_start_ms: i64,
    samples: Vec<AtomicU64>,
    write_index: AtomicU64,
}

impl PercentileBucket {
    fn new(window_start_ms: i64, capacity: usize) -> Self {
        Self {
            window_start_ms,
            samples: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            write_index: AtomicU64::new(0),
        }
    }

    fn add_value(&self, latency_ms: i64) {
        let capacity = self.samples.len() as u64;
        let idx = self.write_index.fetch_add(1, Ordering::Relaxed);
        self.samples[(idx % capacity) as usize].store(latency_ms.max(0) as u64, Ordering::Relaxed);
    }

    fn length(&self) -> usize {
        (self.write_index.load(Ordering::Relaxed) as usize).min(self.samples.len())
    }

    fn values(&self) -> Vec<i64> {
        let len = self.length();
        self.samples[..len]
            .iter()
            .map(|s| s.load(Ordering::Relaxed) as i64)
            .collect()
    }
}

/// An immutable, sorted-ascending snapshot of every sample across the live
/// window, plus the arithmetic mean. Replaced wholesale on each rollover;
/// readers always see a complete, consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct PercentileSnapshot {
    sorted: Arc<Vec<i64>>,
    mean: i64,
}

impl PercentileSnapshot {
    fn from_samples(mut samples: Vec<i64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let sum: i64 = samples.iter().sum();
        let mean = sum / samples.len() as i64;
        samples.sort_unstable();
        Self { sorted: Arc::new(samples), mean }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn mean(&self) -> i64 {
        self.mean
    }

    /// `p` in `[0, 100]`; values outside the range clamp to the nearest end.
    pub fn percentile(&self, p: f64) -> i64 {
        let len = self.sorted.len();
        if len == 0 {
            return 0;
        }
        if p <= 0.0 {
            return self.sorted[0];
        }
        if p >= 100.0 {
            return self.sorted[len - 1];
        }

        let rank = (p / 100.0) * len as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;

        if hi >= len {
            return self.sorted[len - 1];
        }
        if lo == hi {
            return self.sorted[lo];
        }
        let (lo_val, hi_val) = (self.sorted[lo] as f64, self.sorted[hi] as f64);
        (lo_val + (rank - lo as f64) * (hi_val - lo_val)) as i64
    }
}

/// A rolling window of latency samples, windowed the same way as
/// [`crate::rolling::number::RollingNumber`] but carrying a fixed-capacity
/// sample ring per bucket instead of per-kind counters.
pub struct RollingPercentile {
    clock: Arc<dyn Clock>,
    window_ms: i64,
    bucket_count: usize,
    bucket_width_ms: i64,
    bucket_sample_capacity: usize,
    enabled: bool,
    window: RwLock<VecDeque<Arc<PercentileBucket>>>,
    snapshot: RwLock<Arc<PercentileSnapshot>>,
}

impl RollingPercentile {
    pub fn new(
        clock: Arc<dyn Clock>,
        window_ms: i64,
        bucket_count: usize,
        bucket_sample_capacity: usize,
        enabled: bool,
    ) -> Result<Self, ConfigError> {
        if bucket_count == 0 || window_ms % (bucket_count as i64) != 0 {
            return Err(ConfigError::IndivisibleWindow { window_ms, bucket_count });
        }
        if enabled && bucket_sample_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            clock,
            window_ms,
            bucket_count,
            bucket_width_ms: window_ms / bucket_count as i64,
            bucket_sample_capacity,
            enabled,
            window: RwLock::new(VecDeque::with_capacity(bucket_count)),
            snapshot: RwLock::new(Arc::new(PercentileSnapshot::default())),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn add_value(&self, latency_ms: i64) {
        if !self.enabled {
            return;
        }
        self.current_bucket().add_value(latency_ms);
    }

    pub fn percentile(&self, p: f64) -> i64 {
        if !self.enabled {
            return -1;
        }
        let _ = self.current_bucket();
        self.latest_snapshot().percentile(p)
    }

    pub fn mean(&self) -> i64 {
        if !self.enabled {
            return -1;
        }
        let _ = self.current_bucket();
        self.latest_snapshot().mean()
    }

    pub fn latest_snapshot(&self) -> Arc<PercentileSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    fn recompute_snapshot(&self, guard: &VecDeque<Arc<PercentileBucket>>) {
        let mut samples = Vec::new();
        for bucket in guard.iter() {
            samples.extend(bucket.values());
        }
        let snapshot = Arc::new(PercentileSnapshot::from_samples(samples));
        *self.snapshot.write().unwrap() = snapshot;
    }

    fn current_bucket(&self) -> Arc<PercentileBucket> {
        let now = self.clock.now_millis();

        if let Some(head) = self.window.read().unwrap().front() {
            if now < head.window_start_ms + self.bucket_width_ms {
                return Arc::clone(head);
            }
        }

        let mut guard = self.window.write().unwrap();
        loop {
            match guard.front().cloned() {
                None => {
                    // Mirrors the reference semantics: creating the very
                    // first bucket does not recompute the snapshot, so a
                    // percentile/mean read before any rollover sees the
                    // empty default snapshot even if samples were added.
                    let bucket = Arc::new(PercentileBucket::new(now, self.bucket_sample_capacity));
                    guard.push_front(Arc::clone(&bucket));
                    return bucket;
                }
                Some(head) => {
                    if now < head.window_start_ms + self.bucket_width_ms {
                        return head;
                    }
                    if now - (head.window_start_ms + self.bucket_width_ms) > self.window_ms {
                        guard.clear();
                        continue;
                    }
                    let new_start = head.window_start_ms + self.bucket_width_ms;
                    let bucket = Arc::new(PercentileBucket::new(new_start, self.bucket_sample_capacity));
                    guard.push_front(Arc::clone(&bucket));
                    if guard.len() > self.bucket_count {
                        guard.pop_back();
                    }
                    self.recompute_snapshot(&guard);
                    // loop again in case several rollovers are needed to catch up
                }
            }
        }
    }
}
