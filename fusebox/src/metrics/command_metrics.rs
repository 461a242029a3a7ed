//! Aggregates the counters + percentile window + health snapshot for one
//! command key (§4.4). Owns exactly one [`RollingNumber`] and one
//! [`RollingPercentile`]; every `mark_*` call increments the relevant
//! counter, optionally feeds a latency sample, then notifies the plugged
//! [`EventNotifier`] — in that order, per §4.7's event-emission guarantee.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::ConfigError;
use crate::events::{CounterKind, EventKind};
use crate::keys::CommandKey;
use crate::metrics::health::HealthSnapshot;
use crate::notifier::EventNotifier;
use crate::properties::Properties;
use crate::rolling::number::RollingNumber;
use crate::rolling::percentile::RollingPercentile;

pub struct CommandMetrics {
    key: CommandKey,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn EventNotifier>,
    counters: RollingNumber,
    latencies: RollingPercentile,
    health_snapshot_interval_ms: i64,
    last_snapshot_time: AtomicI64,
    snapshot: std::sync::RwLock<HealthSnapshot>,
}

impl CommandMetrics {
    pub fn new(
        key: CommandKey,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn EventNotifier>,
        properties: &Properties,
    ) -> Result<Self, ConfigError> {
        let counters = RollingNumber::new(
            clock.clone(),
            properties.metrics_rolling_stats_window_ms,
            properties.metrics_rolling_stats_buckets,
        )?;
        let latencies = RollingPercentile::new(
            clock.clone(),
            properties.metrics_rolling_percentile_window_ms,
            properties.metrics_rolling_percentile_buckets,
            properties.metrics_rolling_percentile_bucket_size,
            properties.metrics_rolling_percentile_enabled,
        )?;
        Ok(Self {
            key,
            clock,
            notifier,
            counters,
            latencies,
            health_snapshot_interval_ms: properties.metrics_health_snapshot_interval_ms,
            last_snapshot_time: AtomicI64::new(i64::MIN),
            snapshot: std::sync::RwLock::new(HealthSnapshot::default()),
        })
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn notifier(&self) -> Arc<dyn EventNotifier> {
        self.notifier.clone()
    }

    pub fn counters(&self) -> &RollingNumber {
        &self.counters
    }

    pub fn latencies(&self) -> &RollingPercentile {
        &self.latencies
    }

    async fn mark(&self, kind: CounterKind) {
        self.counters.increment(kind);
        self.notifier.mark_event(EventKind::Counter(kind), &self.key).await;
    }

    async fn mark_with_latency(&self, kind: CounterKind, dur_ms: i64) {
        self.counters.increment(kind);
        self.latencies.add_value(dur_ms);
        self.notifier.mark_event(EventKind::Counter(kind), &self.key).await;
    }

    pub async fn mark_success(&self, dur_ms: i64) {
        self.mark_with_latency(CounterKind::Success, dur_ms).await;
    }

    pub async fn mark_failure(&self, dur_ms: i64) {
        self.mark_with_latency(CounterKind::Failure, dur_ms).await;
    }

    pub async fn mark_timeout(&self, dur_ms: i64) {
        self.mark_with_latency(CounterKind::Timeout, dur_ms).await;
    }

    /// `BAD_REQUEST` is excluded from error-percentage accounting (§3's
    /// `HealthSnapshot.errors` definition) but still records a latency
    /// sample, per §4.4.
    pub async fn mark_bad_request(&self, dur_ms: i64) {
        self.mark_with_latency(CounterKind::BadRequest, dur_ms).await;
    }

    pub async fn mark_short_circuited(&self) {
        self.mark(CounterKind::ShortCircuited).await;
    }

    pub async fn mark_thread_pool_rejected(&self) {
        self.mark(CounterKind::ThreadPoolRejected).await;
    }

    pub async fn mark_semaphore_rejected(&self) {
        self.mark(CounterKind::SemaphoreRejected).await;
    }

    pub async fn mark_fallback_success(&self) {
        self.mark(CounterKind::FallbackSuccess).await;
    }

    pub async fn mark_fallback_failure(&self) {
        self.mark(CounterKind::FallbackFailure).await;
    }

    pub async fn mark_fallback_rejection(&self) {
        self.mark(CounterKind::FallbackRejection).await;
    }

    pub async fn mark_response_from_cache(&self) {
        self.mark(CounterKind::ResponseFromCache).await;
    }

    pub async fn mark_exception_thrown(&self) {
        self.mark(CounterKind::ExceptionThrown).await;
    }

    pub async fn mark_collapsed(&self) {
        self.mark(CounterKind::Collapsed).await;
    }

    pub async fn mark_emit(&self) {
        self.mark(CounterKind::Emit).await;
    }

    pub async fn mark_fallback_emit(&self) {
        self.mark(CounterKind::FallbackEmit).await;
    }

    /// Returns the cached snapshot if still fresh; otherwise exactly one
    /// caller wins a CAS on `last_snapshot_time` and recomputes, losers fall
    /// back to the (briefly) stale cached value rather than blocking.
    pub fn health_counts(&self) -> HealthSnapshot {
        let now = self.clock.now_millis();
        let last = self.last_snapshot_time.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.health_snapshot_interval_ms {
            return *self.snapshot.read().unwrap();
        }
        if self
            .last_snapshot_time
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let snap = HealthSnapshot::compute(
                self.counters.rolling_sum(CounterKind::Success),
                self.counters.rolling_sum(CounterKind::Failure),
                self.counters.rolling_sum(CounterKind::Timeout),
                self.counters.rolling_sum(CounterKind::ThreadPoolRejected),
                self.counters.rolling_sum(CounterKind::SemaphoreRejected),
                self.counters.rolling_sum(CounterKind::ShortCircuited),
                now,
            );
            *self.snapshot.write().unwrap() = snap;
            snap
        } else {
            *self.snapshot.read().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::notifier::NoopEventNotifier;

    fn metrics() -> (Arc<MockClock>, CommandMetrics) {
        let clock = Arc::new(MockClock::new());
        let cm = CommandMetrics::new(
            CommandKey::new("Test"),
            clock.clone(),
            Arc::new(NoopEventNotifier),
            &Properties::default(),
        )
        .unwrap();
        (clock, cm)
    }

    #[tokio::test]
    async fn health_counts_total_matches_contributing_kinds() {
        let (_clock, cm) = metrics();
        cm.mark_success(5).await;
        cm.mark_success(5).await;
        cm.mark_failure(5).await;
        cm.mark_timeout(5).await;
        cm.mark_short_circuited().await;
        cm.mark_semaphore_rejected().await;

        let snap = cm.health_counts();
        assert_eq!(snap.total, 6);
        assert_eq!(snap.errors, 4);
    }

    #[tokio::test]
    async fn bad_request_is_excluded_from_error_accounting() {
        let (_clock, cm) = metrics();
        cm.mark_success(1).await;
        cm.mark_bad_request(1).await;

        let snap = cm.health_counts();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.errors, 0);
    }

    #[tokio::test]
    async fn health_snapshot_is_cached_within_the_interval() {
        let (clock, cm) = metrics();
        cm.mark_success(1).await;
        let first = cm.health_counts();
        cm.mark_failure(1).await;
        let still_cached = cm.health_counts();
        assert_eq!(first, still_cached);

        clock.increment(cm.health_snapshot_interval_ms);
        let refreshed = cm.health_counts();
        assert_eq!(refreshed.total, 2);
    }
}
