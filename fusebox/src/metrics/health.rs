//! Periodically recomputed health tuple driving circuit-breaker decisions.

/// `{total, errors, error_percent, snapshot_time_ms}` as defined in §3.
/// `errors = FAILURE + TIMEOUT + THREAD_POOL_REJECTED + SEMAPHORE_REJECTED +
/// SHORT_CIRCUITED`; `total = errors + SUCCESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthSnapshot {
    pub total: i64,
    pub errors: i64,
    pub error_percent: i64,
    pub snapshot_time_ms: i64,
}

impl HealthSnapshot {
    pub fn compute(success: i64, failure: i64, timeout: i64, pool_rejected: i64, semaphore_rejected: i64, short_circuited: i64, now_ms: i64) -> Self {
        let errors = failure + timeout + pool_rejected + semaphore_rejected + short_circuited;
        let total = errors + success;
        let error_percent = if total == 0 { 0 } else { errors * 100 / total };
        Self { total, errors, error_percent, snapshot_time_ms: now_ms }
    }
}
