//! Three-state breaker (CLOSED/OPEN/HALF_OPEN) whose open/close decisions
//! are a pure function of a [`CommandMetrics`] health snapshot (§4.5).
//!
//! Modeled as two atomics rather than an enum behind a lock: `is_open` plus
//! `opened_at_ms` capture OPEN vs CLOSED, and `half_open_trial_in_flight`
//! distinguishes "OPEN, sleep window not yet elapsed" from "HALF_OPEN, one
//! trial admitted" without a third state value to synchronize.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::metrics::CommandMetrics;
use crate::properties::Properties;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    metrics: Arc<CommandMetrics>,
    enabled: bool,
    force_open: bool,
    force_closed: bool,
    request_volume_threshold: i64,
    error_threshold_percent: i64,
    sleep_window_ms: i64,
    is_open: AtomicBool,
    opened_at_ms: AtomicI64,
    half_open_trial_in_flight: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(metrics: Arc<CommandMetrics>, properties: &Properties) -> Self {
        Self {
            metrics,
            enabled: properties.circuit_breaker_enabled,
            force_open: properties.circuit_breaker_force_open,
            force_closed: properties.circuit_breaker_force_closed,
            request_volume_threshold: properties.circuit_breaker_request_volume_threshold,
            error_threshold_percent: properties.circuit_breaker_error_threshold_percent,
            sleep_window_ms: properties.circuit_breaker_sleep_window_ms,
            is_open: AtomicBool::new(false),
            opened_at_ms: AtomicI64::new(0),
            half_open_trial_in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> BreakerState {
        if !self.is_open.load(Ordering::Acquire) {
            BreakerState::Closed
        } else if self.half_open_trial_in_flight.load(Ordering::Acquire) {
            BreakerState::HalfOpen
        } else {
            BreakerState::Open
        }
    }

    /// Side-effect-free except for the implicit OPEN → HALF_OPEN transition,
    /// which admits at most one trial per sleep window via CAS.
    pub fn allow_request(&self) -> bool {
        if self.force_open {
            return false;
        }
        if !self.enabled || self.force_closed {
            return true;
        }

        if self.is_open.load(Ordering::Acquire) {
            let now = self.metrics.clock().now_millis();
            let opened_at = self.opened_at_ms.load(Ordering::Acquire);
            if now - opened_at < self.sleep_window_ms {
                return false;
            }
            let admitted = self
                .half_open_trial_in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
            if admitted {
                debug!(key = %self.metrics.key(), "circuit breaker admitting HALF_OPEN trial");
            }
            return admitted;
        }

        let health = self.metrics.health_counts();
        if health.total >= self.request_volume_threshold && health.error_percent >= self.error_threshold_percent {
            let now = self.metrics.clock().now_millis();
            if self
                .is_open
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.opened_at_ms.store(now, Ordering::Release);
                warn!(
                    key = %self.metrics.key(),
                    total = health.total,
                    error_percent = health.error_percent,
                    "circuit breaker tripped OPEN"
                );
            }
            return false;
        }
        true
    }

    /// HALF_OPEN → CLOSED on a successful trial. No-op outside HALF_OPEN.
    pub fn on_success(&self) {
        if self
            .half_open_trial_in_flight
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.is_open.store(false, Ordering::Release);
            info!(key = %self.metrics.key(), "circuit breaker closed after a successful HALF_OPEN trial");
        }
    }

    /// HALF_OPEN → OPEN on a failed trial, resetting the sleep window.
    pub fn on_failure(&self) {
        if self
            .half_open_trial_in_flight
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let now = self.metrics.clock().now_millis();
            self.opened_at_ms.store(now, Ordering::Release);
            warn!(key = %self.metrics.key(), "circuit breaker reopened after a failed HALF_OPEN trial");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::keys::CommandKey;
    use crate::notifier::NoopEventNotifier;

    fn breaker(volume: i64, pct: i64, sleep_window_ms: i64) -> (Arc<MockClock>, CircuitBreaker) {
        let clock = Arc::new(MockClock::new());
        let properties = Properties {
            circuit_breaker_request_volume_threshold: volume,
            circuit_breaker_error_threshold_percent: pct,
            circuit_breaker_sleep_window_ms: sleep_window_ms,
            ..Properties::default()
        };
        let metrics = Arc::new(
            CommandMetrics::new(CommandKey::new("Test"), clock.clone(), Arc::new(NoopEventNotifier), &properties)
                .unwrap(),
        );
        (clock, CircuitBreaker::new(metrics, &properties))
    }

    #[tokio::test]
    async fn force_open_always_rejects_regardless_of_health() {
        let (_clock, mut cb) = breaker(5, 50, 5000);
        cb.force_open = true;
        assert!(!cb.allow_request());
    }

    #[tokio::test]
    async fn force_closed_always_allows_when_not_forced_open() {
        let (_clock, mut cb) = breaker(5, 50, 5000);
        cb.force_closed = true;
        assert!(cb.allow_request());
    }

    // S7 — breaker trips.
    #[tokio::test]
    async fn trips_open_then_half_opens_after_sleep_window_then_closes() {
        let (clock, cb) = breaker(5, 50, 5000);
        for _ in 0..3 {
            cb.metrics.mark_success(1).await;
        }
        for _ in 0..3 {
            cb.metrics.mark_failure(1).await;
        }

        assert!(!cb.allow_request());
        assert_eq!(cb.state(), BreakerState::Open);

        clock.increment(5000);
        assert!(cb.allow_request());
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        // a second concurrent caller must not get a trial of its own
        assert!(!cb.allow_request());

        cb.metrics.mark_success(1).await;
        cb.on_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn failed_trial_reopens_and_restarts_the_sleep_window() {
        let (clock, cb) = breaker(5, 50, 5000);
        for _ in 0..3 {
            cb.metrics.mark_success(1).await;
        }
        for _ in 0..3 {
            cb.metrics.mark_failure(1).await;
        }
        cb.allow_request();
        clock.increment(5000);
        assert!(cb.allow_request());
        cb.on_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_request());
    }
}
