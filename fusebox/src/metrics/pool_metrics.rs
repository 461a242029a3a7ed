//! Lock-free counters for a worker pool, grounded on the teacher's
//! `streaming/atomic_metrics.rs::AtomicStreamingMetrics` (plain atomics on
//! the hot path, no mutex contention between submitters and the pool).

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct PoolMetrics {
    max_workers: usize,
    active: AtomicUsize,
    queued: AtomicUsize,
    rejected: AtomicI64,
}

impl PoolMetrics {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            rejected: AtomicI64::new(0),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn queue_size(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> i64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) fn task_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn task_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_update_active_and_queue_counts() {
        let m = PoolMetrics::new(5);
        m.task_queued();
        assert_eq!(m.queue_size(), 1);
        m.task_started();
        assert_eq!(m.queue_size(), 0);
        assert_eq!(m.active_count(), 1);
        m.task_finished();
        assert_eq!(m.active_count(), 0);
    }

    #[test]
    fn rejections_are_counted_independently_of_lifecycle() {
        let m = PoolMetrics::new(5);
        m.task_rejected();
        m.task_rejected();
        assert_eq!(m.rejected_count(), 2);
        assert_eq!(m.active_count(), 0);
    }
}
