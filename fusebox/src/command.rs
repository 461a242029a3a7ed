//! Orchestrates isolation → timeout → fallback → cache → event emission for
//! one command invocation (§4.7), grounded on the teacher's
//! `executors/command.rs` pipeline shape (admit, dispatch, await-with-timeout,
//! recover) re-targeted at this spec's circuit-breaker/pool substrate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::error::{CommandError, FallbackCause, PrimaryCause, SemaphoreRejected};
use crate::events::{CounterKind, EventKind};
use crate::keys::CommandKey;
use crate::metrics::CommandMetrics;
use crate::pool::Pool;
use crate::properties::{IsolationStrategy, Properties};

/// Request-scoped de-duplication cache keyed by `cache_key()` (§4.7); an
/// external collaborator. The core ships only the trait and a no-op default.
#[async_trait]
pub trait RequestCache<T: Clone + Send + Sync>: Send + Sync {
    async fn get(&self, key: &str) -> Option<T>;
    async fn put(&self, key: &str, value: T);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequestCache;

#[async_trait]
impl<T: Clone + Send + Sync> RequestCache<T> for NoopRequestCache {
    async fn get(&self, _key: &str) -> Option<T> {
        None
    }

    async fn put(&self, _key: &str, _value: T) {}
}

/// User-supplied risky operation plus optional fallback and cache key.
#[async_trait]
pub trait Command: Send + Sync {
    type Output: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn key(&self) -> &CommandKey;

    async fn run(&self) -> Result<Self::Output, Self::Error>;

    /// `None` means "not implemented" — the pipeline raises
    /// `FallbackNotImplemented` wrapping the original cause (§4.7 default).
    async fn fallback(&self) -> Option<Result<Self::Output, Self::Error>> {
        None
    }

    fn cache_key(&self) -> Option<String> {
        None
    }

    /// User-originated input errors bypass the breaker's error-percentage
    /// accounting (§7 `BadRequest`) but still record a latency sample.
    fn is_bad_request(&self, _error: &Self::Error) -> bool {
        false
    }
}

enum RunOutcome<E> {
    Primary(PrimaryCause<E>),
    BadRequest(E),
}

/// Binds one [`Command`] to the metrics/breaker/pool it runs against and
/// drives the execution pipeline. Built per command key by the caller,
/// typically from objects a [`crate::registry::Registry`] hands out.
pub struct CommandExecutor<C: Command> {
    command: Arc<C>,
    metrics: Arc<CommandMetrics>,
    breaker: Arc<CircuitBreaker>,
    pool: Arc<Pool>,
    run_semaphore: Arc<Semaphore>,
    fallback_semaphore: Arc<Semaphore>,
    properties: Properties,
    cache: Arc<dyn RequestCache<C::Output>>,
}

impl<C: Command + 'static> CommandExecutor<C> {
    pub fn new(
        command: Arc<C>,
        metrics: Arc<CommandMetrics>,
        breaker: Arc<CircuitBreaker>,
        pool: Arc<Pool>,
        properties: Properties,
        cache: Arc<dyn RequestCache<C::Output>>,
    ) -> Self {
        let run_semaphore = Arc::new(Semaphore::new(properties.execution_isolation_semaphore_max_concurrent));
        let fallback_semaphore = Arc::new(Semaphore::new(properties.fallback_isolation_semaphore_max_concurrent));
        Self {
            command,
            metrics,
            breaker,
            pool,
            run_semaphore,
            fallback_semaphore,
            properties,
            cache,
        }
    }

    /// Synchronous from the caller's point of view: awaits the full
    /// pipeline and returns `run`'s or `fallback`'s value, or a terminal error.
    pub async fn execute(&self) -> Result<C::Output, CommandError<C::Error>> {
        self.queue().await
    }

    /// Identical to `execute` in this core — there is no reactive push model.
    pub async fn queue(&self) -> Result<C::Output, CommandError<C::Error>> {
        let started = Instant::now();
        let key = self.command.key().clone();
        let mut events: Vec<EventKind> = Vec::new();

        let result = self.queue_inner(&key, started, &mut events).await;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        match &result {
            Ok(_) => debug!(key = %key, elapsed_ms, "command execution completed"),
            Err(err) => warn!(key = %key, elapsed_ms, %err, "command execution terminated with an error"),
        }
        self.metrics
            .notifier()
            .mark_command_execution(&key, self.properties.execution_isolation_strategy, elapsed_ms, &events)
            .await;
        result
    }

    async fn queue_inner(
        &self,
        key: &CommandKey,
        started: Instant,
        events: &mut Vec<EventKind>,
    ) -> Result<C::Output, CommandError<C::Error>> {
        if !self.breaker.allow_request() {
            self.metrics.mark_short_circuited().await;
            events.push(EventKind::Counter(CounterKind::ShortCircuited));
            return self.fallback_path(key.clone(), started, PrimaryCause::ShortCircuited, events).await;
        }

        if self.properties.request_cache_enabled {
            if let Some(cache_key) = self.command.cache_key() {
                if let Some(value) = self.cache.get(&cache_key).await {
                    self.metrics.mark_response_from_cache().await;
                    events.push(EventKind::Counter(CounterKind::ResponseFromCache));
                    return Ok(value);
                }
            }
        }

        let outcome = match self.properties.execution_isolation_strategy {
            IsolationStrategy::Thread => self.run_via_pool(started, events).await,
            IsolationStrategy::Semaphore => self.run_via_semaphore(started, events).await,
        };

        match outcome {
            Ok(value) => {
                self.breaker.on_success();
                if self.properties.request_cache_enabled {
                    if let Some(cache_key) = self.command.cache_key() {
                        self.cache.put(&cache_key, value.clone()).await;
                    }
                }
                Ok(value)
            }
            Err(RunOutcome::BadRequest(err)) => {
                let elapsed = started.elapsed();
                Err(CommandError::BadRequest { key: key.clone(), elapsed, cause: err })
            }
            Err(RunOutcome::Primary(cause)) => {
                self.breaker.on_failure();
                self.fallback_path(key.clone(), started, cause, events).await
            }
        }
    }

    pub async fn observe(&self) -> Result<C::Output, CommandError<C::Error>> {
        self.queue().await
    }

    async fn run_via_pool(
        &self,
        started: Instant,
        events: &mut Vec<EventKind>,
    ) -> Result<C::Output, RunOutcome<C::Error>> {
        let command = Arc::clone(&self.command);
        let timeout = Duration::from_millis(self.properties.execution_isolation_thread_timeout_ms);
        let already_terminal = Arc::new(AtomicBool::new(false));
        let terminal_for_task = Arc::clone(&already_terminal);

        let handle = match self.pool.submit(async move { command.run().await }) {
            Ok(handle) => handle,
            Err(_) => {
                self.metrics.mark_thread_pool_rejected().await;
                events.push(EventKind::Counter(CounterKind::ThreadPoolRejected));
                return Err(RunOutcome::Primary(PrimaryCause::PoolRejected));
            }
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(value))) if !terminal_for_task.swap(true, Ordering::AcqRel) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.metrics.mark_success(elapsed).await;
                events.push(EventKind::Counter(CounterKind::Success));
                Ok(value)
            }
            Ok(Ok(Ok(_value))) => {
                // Orphaned worker completed after the timeout path already
                // returned; its outcome must not be re-marked.
                Err(RunOutcome::Primary(PrimaryCause::ExecutionTimeout))
            }
            Ok(Ok(Err(err))) => {
                let elapsed = started.elapsed().as_millis() as i64;
                if self.command.is_bad_request(&err) {
                    self.metrics.mark_bad_request(elapsed).await;
                    events.push(EventKind::Counter(CounterKind::BadRequest));
                    Err(RunOutcome::BadRequest(err))
                } else {
                    self.metrics.mark_failure(elapsed).await;
                    events.push(EventKind::Counter(CounterKind::Failure));
                    Err(RunOutcome::Primary(PrimaryCause::ExecutionFailure(err)))
                }
            }
            Ok(Err(_join_error)) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.metrics.mark_failure(elapsed).await;
                events.push(EventKind::Counter(CounterKind::Failure));
                Err(RunOutcome::Primary(PrimaryCause::Panicked))
            }
            Err(_elapsed) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.metrics.mark_timeout(elapsed).await;
                events.push(EventKind::Counter(CounterKind::Timeout));
                already_terminal.store(true, Ordering::Release);
                Err(RunOutcome::Primary(PrimaryCause::ExecutionTimeout))
            }
        }
    }

    async fn run_via_semaphore(
        &self,
        started: Instant,
        events: &mut Vec<EventKind>,
    ) -> Result<C::Output, RunOutcome<C::Error>> {
        let permit = match self.run_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.mark_semaphore_rejected().await;
                events.push(EventKind::Counter(CounterKind::SemaphoreRejected));
                let max_concurrent = self.properties.execution_isolation_semaphore_max_concurrent;
                let in_flight = max_concurrent.saturating_sub(self.run_semaphore.available_permits());
                return Err(RunOutcome::Primary(PrimaryCause::SemaphoreRejected(SemaphoreRejected {
                    in_flight,
                    max_concurrent,
                })));
            }
        };

        let timeout = Duration::from_millis(self.properties.execution_isolation_thread_timeout_ms);
        let result = tokio::time::timeout(timeout, self.command.run()).await;
        drop(permit);

        match result {
            Ok(Ok(value)) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.metrics.mark_success(elapsed).await;
                events.push(EventKind::Counter(CounterKind::Success));
                Ok(value)
            }
            Ok(Err(err)) => {
                let elapsed = started.elapsed().as_millis() as i64;
                if self.command.is_bad_request(&err) {
                    self.metrics.mark_bad_request(elapsed).await;
                    events.push(EventKind::Counter(CounterKind::BadRequest));
                    Err(RunOutcome::BadRequest(err))
                } else {
                    self.metrics.mark_failure(elapsed).await;
                    events.push(EventKind::Counter(CounterKind::Failure));
                    Err(RunOutcome::Primary(PrimaryCause::ExecutionFailure(err)))
                }
            }
            Err(_elapsed) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.metrics.mark_timeout(elapsed).await;
                events.push(EventKind::Counter(CounterKind::Timeout));
                Err(RunOutcome::Primary(PrimaryCause::ExecutionTimeout))
            }
        }
    }

    async fn fallback_path(
        &self,
        key: CommandKey,
        started: Instant,
        cause: PrimaryCause<C::Error>,
        events: &mut Vec<EventKind>,
    ) -> Result<C::Output, CommandError<C::Error>> {
        if !self.properties.fallback_enabled {
            self.metrics.mark_fallback_failure().await;
            events.push(EventKind::Counter(CounterKind::FallbackFailure));
            return Err(CommandError::FallbackNotImplemented { key, elapsed: started.elapsed(), cause });
        }

        let permit = match self.fallback_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.mark_fallback_rejection().await;
                events.push(EventKind::Counter(CounterKind::FallbackRejection));
                return Err(CommandError::FallbackRejection { key, elapsed: started.elapsed() });
            }
        };

        let outcome = self.command.fallback().await;
        drop(permit);

        match outcome {
            None => {
                self.metrics.mark_fallback_failure().await;
                events.push(EventKind::Counter(CounterKind::FallbackFailure));
                Err(CommandError::FallbackNotImplemented { key, elapsed: started.elapsed(), cause })
            }
            Some(Ok(value)) => {
                self.metrics.mark_fallback_success().await;
                events.push(EventKind::Counter(CounterKind::FallbackSuccess));
                Ok(value)
            }
            Some(Err(err)) => {
                self.metrics.mark_fallback_failure().await;
                events.push(EventKind::Counter(CounterKind::FallbackFailure));
                Err(CommandError::FallbackFailure {
                    key,
                    elapsed: started.elapsed(),
                    cause: FallbackCause::Failed(err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notifier::NoopEventNotifier;
    use std::sync::atomic::AtomicU32;
    use thiserror::Error;
    use tokio::time::sleep;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct BoomError;

    struct HappyPath;

    #[async_trait]
    impl Command for HappyPath {
        type Output = &'static str;
        type Error = BoomError;

        fn key(&self) -> &CommandKey {
            static KEY: std::sync::OnceLock<CommandKey> = std::sync::OnceLock::new();
            KEY.get_or_init(|| CommandKey::new("Happy"))
        }

        async fn run(&self) -> Result<Self::Output, Self::Error> {
            sleep(Duration::from_millis(5)).await;
            Ok("ok")
        }
    }

    struct SlowWithFallback;

    #[async_trait]
    impl Command for SlowWithFallback {
        type Output = &'static str;
        type Error = BoomError;

        fn key(&self) -> &CommandKey {
            static KEY: std::sync::OnceLock<CommandKey> = std::sync::OnceLock::new();
            KEY.get_or_init(|| CommandKey::new("Slow"))
        }

        async fn run(&self) -> Result<Self::Output, Self::Error> {
            sleep(Duration::from_millis(2000)).await;
            Ok("too-late")
        }

        async fn fallback(&self) -> Option<Result<Self::Output, Self::Error>> {
            Some(Ok("fb"))
        }
    }

    fn executor<C: Command + 'static>(command: C, properties: Properties) -> CommandExecutor<C> {
        let clock = Arc::new(SystemClock::default());
        let key = command.key().clone();
        let metrics =
            Arc::new(CommandMetrics::new(key.clone(), clock, Arc::new(NoopEventNotifier), &properties).unwrap());
        let breaker = Arc::new(CircuitBreaker::new(Arc::clone(&metrics), &properties));
        let pool = Arc::new(Pool::new(5, 5));
        CommandExecutor::new(Arc::new(command), metrics, breaker, pool, properties, Arc::new(NoopRequestCache))
    }

    // S5 — command happy path.
    #[tokio::test]
    async fn s5_happy_path_returns_run_value() {
        let exec = executor(HappyPath, Properties::default());
        let result = exec.execute().await.unwrap();
        assert_eq!(result, "ok");
        assert_eq!(exec.metrics.counters().rolling_sum(crate::events::CounterKind::Success), 1);
    }

    // S6 — fallback on timeout.
    #[tokio::test]
    async fn s6_fallback_on_timeout() {
        let properties = Properties {
            execution_isolation_thread_timeout_ms: 50,
            ..Properties::default()
        };
        let exec = executor(SlowWithFallback, properties);
        let result = exec.execute().await.unwrap();
        assert_eq!(result, "fb");
        assert_eq!(exec.metrics.counters().rolling_sum(crate::events::CounterKind::Timeout), 1);
        assert_eq!(exec.metrics.counters().rolling_sum(crate::events::CounterKind::FallbackSuccess), 1);
    }

    struct NoFallback {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Command for NoFallback {
        type Output = &'static str;
        type Error = BoomError;

        fn key(&self) -> &CommandKey {
            static KEY: std::sync::OnceLock<CommandKey> = std::sync::OnceLock::new();
            KEY.get_or_init(|| CommandKey::new("NoFallback"))
        }

        async fn run(&self) -> Result<Self::Output, Self::Error> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(BoomError)
        }
    }

    #[tokio::test]
    async fn raises_fallback_not_implemented_when_run_fails_with_no_fallback() {
        let exec = executor(NoFallback { attempts: AtomicU32::new(0) }, Properties::default());
        let err = exec.execute().await.unwrap_err();
        assert!(matches!(err, CommandError::FallbackNotImplemented { .. }));
    }
}
