//! Bounded worker pool providing thread-isolation of `run()` (§4.6),
//! grounded on the teacher's `streaming/worker_pool.rs` — a `Semaphore`
//! gating concurrent work with `try_acquire_owned` for immediate rejection
//! rather than queueing indefinitely.
//!
//! Two semaphores model "max_workers active, plus a bounded queue": admission
//! has `max_workers + queue_capacity` permits and decides `submit()`
//! acceptance immediately; `workers` has `max_workers` permits and is
//! acquired (awaited) inside the spawned task, so a task holding only an
//! admission permit is, in effect, queued.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::PoolRejected;
use crate::metrics::PoolMetrics;

pub struct Pool {
    max_workers: usize,
    queue_capacity: usize,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    metrics: Arc<PoolMetrics>,
}

impl Pool {
    pub fn new(max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            max_workers,
            queue_capacity,
            admission: Arc::new(Semaphore::new(max_workers + queue_capacity)),
            workers: Arc::new(Semaphore::new(max_workers)),
            metrics: Arc::new(PoolMetrics::new(max_workers)),
        }
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    /// Submits `fut` for isolated execution. Fails immediately with
    /// `PoolRejected` when both the worker slots and the queue are full;
    /// never blocks the caller.
    pub fn submit<F, T>(&self, fut: F) -> Result<JoinHandle<T>, PoolRejected>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let admission_permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.task_rejected();
                return Err(PoolRejected {
                    active: self.metrics.active_count(),
                    max_workers: self.max_workers,
                    queued: self.metrics.queue_size(),
                    queue_capacity: self.queue_capacity,
                });
            }
        };

        self.metrics.task_queued();
        let workers = self.workers.clone();
        let metrics = self.metrics.clone();

        Ok(tokio::spawn(async move {
            let _worker_permit = workers
                .acquire_owned()
                .await
                .expect("worker semaphore is never closed");
            metrics.task_started();
            let result = fut.await;
            metrics.task_finished();
            drop(admission_permit);
            result
        }))
    }

    pub fn active_count(&self) -> usize {
        self.metrics.active_count()
    }

    pub fn queue_size(&self) -> usize {
        self.metrics.queue_size()
    }
}
