//! One `thiserror` enum per fallible subsystem, following the teacher's
//! per-module convention (`CommandExecutionError`, `IsolationError`) rather
//! than a single crate-wide error type.

use std::time::Duration;
use thiserror::Error;

use crate::events::{CounterKind, MaxKind};
use crate::keys::CommandKey;

/// Fatal at construction time; no recovery path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window_ms ({window_ms}) must divide evenly into bucket_count ({bucket_count})")]
    IndivisibleWindow { window_ms: i64, bucket_count: usize },
    #[error("bucket capacity must be greater than zero")]
    ZeroCapacity,
}

/// A kind passed to an operation that only accepts the other sub-kind
/// (counter op on a max-updater kind or vice versa). Programmer error —
/// fatal, never recovered by the pipeline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMismatch {
    #[error("{0:?} is a max-updater kind, not a counter kind")]
    ExpectedCounter(MaxKind),
    #[error("{0:?} is a counter kind, not a max-updater kind")]
    ExpectedMaxUpdater(CounterKind),
}

/// Terminal errors surfaced from [`crate::command::Command::execute`] /
/// `queue` / `observe`. Every variant carries the command key and elapsed
/// time; recoverable stages (pool/semaphore rejection, run failure/timeout,
/// short-circuit) are folded into the fallback path before a `CommandError`
/// ever reaches the caller — what's left here is always terminal.
#[derive(Error, Debug)]
pub enum CommandError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("[{key}] fallback rejected by isolation semaphore after {elapsed:?}")]
    FallbackRejection { key: CommandKey, elapsed: Duration },

    #[error("[{key}] fallback failed after {elapsed:?}")]
    FallbackFailure {
        key: CommandKey,
        elapsed: Duration,
        #[source]
        cause: FallbackCause<E>,
    },

    #[error("[{key}] fallback not implemented after {elapsed:?}")]
    FallbackNotImplemented {
        key: CommandKey,
        elapsed: Duration,
        #[source]
        cause: PrimaryCause<E>,
    },

    #[error("[{key}] bad request after {elapsed:?}")]
    BadRequest {
        key: CommandKey,
        elapsed: Duration,
        #[source]
        cause: E,
    },
}

/// The reason the primary `run()` path did not produce a value, preserved as
/// the `#[source]` of a terminal [`CommandError`] when no fallback runs.
#[derive(Error, Debug)]
pub enum PrimaryCause<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("run() failed: {0}")]
    ExecutionFailure(#[source] E),
    #[error("run() exceeded its timeout")]
    ExecutionTimeout,
    #[error("rejected by thread pool")]
    PoolRejected,
    #[error("rejected by isolation semaphore: {0}")]
    SemaphoreRejected(#[source] SemaphoreRejected),
    #[error("short-circuited by open breaker")]
    ShortCircuited,
    #[error("run() task panicked")]
    Panicked,
}

/// The reason `fallback()` itself did not produce a value.
#[derive(Error, Debug)]
pub enum FallbackCause<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("fallback() failed: {0}")]
    Failed(#[source] E),
    #[error(transparent)]
    Primary(#[from] PrimaryCause<E>),
}

impl<E> CommandError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn key(&self) -> &CommandKey {
        match self {
            CommandError::FallbackRejection { key, .. }
            | CommandError::FallbackFailure { key, .. }
            | CommandError::FallbackNotImplemented { key, .. }
            | CommandError::BadRequest { key, .. } => key,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            CommandError::FallbackRejection { elapsed, .. }
            | CommandError::FallbackFailure { elapsed, .. }
            | CommandError::FallbackNotImplemented { elapsed, .. }
            | CommandError::BadRequest { elapsed, .. } => *elapsed,
        }
    }
}

/// Admission denial from the bounded worker pool (§4.6). Recovered locally
/// by the fallback path; only becomes user-visible inside
/// [`PrimaryCause::PoolRejected`] if fallback also fails.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pool at capacity: {active}/{max_workers} workers, queue {queued}/{queue_capacity}")]
pub struct PoolRejected {
    pub active: usize,
    pub max_workers: usize,
    pub queued: usize,
    pub queue_capacity: usize,
}

/// Admission denial from a semaphore-isolated stage (run or fallback).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("semaphore at capacity: {in_flight}/{max_concurrent}")]
pub struct SemaphoreRejected {
    pub in_flight: usize,
    pub max_concurrent: usize,
}
