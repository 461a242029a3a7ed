//! Resolved configuration for a command key (§6). No external config store
//! is wired in — a caller builds a `Properties` with [`PropertiesBuilder`]
//! and overrides only the defaults that matter for their command.

/// Thread isolation strategy for the primary `run()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationStrategy {
    Thread,
    Semaphore,
}

#[derive(Debug, Clone)]
pub struct Properties {
    pub metrics_rolling_stats_window_ms: i64,
    pub metrics_rolling_stats_buckets: usize,

    pub metrics_rolling_percentile_enabled: bool,
    pub metrics_rolling_percentile_window_ms: i64,
    pub metrics_rolling_percentile_buckets: usize,
    pub metrics_rolling_percentile_bucket_size: usize,

    pub metrics_health_snapshot_interval_ms: i64,

    pub circuit_breaker_enabled: bool,
    pub circuit_breaker_request_volume_threshold: i64,
    pub circuit_breaker_sleep_window_ms: i64,
    pub circuit_breaker_error_threshold_percent: i64,
    pub circuit_breaker_force_open: bool,
    pub circuit_breaker_force_closed: bool,

    pub execution_isolation_strategy: IsolationStrategy,
    pub execution_isolation_thread_timeout_ms: u64,
    pub execution_isolation_thread_interrupt_on_timeout: bool,
    pub execution_isolation_semaphore_max_concurrent: usize,

    pub fallback_isolation_semaphore_max_concurrent: usize,
    pub fallback_enabled: bool,

    pub request_cache_enabled: bool,
    pub request_log_enabled: bool,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            metrics_rolling_stats_window_ms: 10_000,
            metrics_rolling_stats_buckets: 10,

            metrics_rolling_percentile_enabled: true,
            metrics_rolling_percentile_window_ms: 60_000,
            metrics_rolling_percentile_buckets: 6,
            metrics_rolling_percentile_bucket_size: 100,

            metrics_health_snapshot_interval_ms: 500,

            circuit_breaker_enabled: true,
            circuit_breaker_request_volume_threshold: 20,
            circuit_breaker_sleep_window_ms: 5_000,
            circuit_breaker_error_threshold_percent: 50,
            circuit_breaker_force_open: false,
            circuit_breaker_force_closed: false,

            execution_isolation_strategy: IsolationStrategy::Thread,
            execution_isolation_thread_timeout_ms: 1_000,
            execution_isolation_thread_interrupt_on_timeout: true,
            execution_isolation_semaphore_max_concurrent: 10,

            fallback_isolation_semaphore_max_concurrent: 10,
            fallback_enabled: true,

            request_cache_enabled: true,
            request_log_enabled: true,
        }
    }
}

/// Chained-setter builder over [`Properties`]; every setter overrides a
/// single default, mirroring the per-property override pattern real Hystrix
/// properties objects expose.
#[derive(Debug, Clone, Default)]
pub struct PropertiesBuilder {
    properties: Properties,
}

impl PropertiesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Properties {
        self.properties
    }

    pub fn metrics_rolling_stats_window_ms(mut self, v: i64) -> Self {
        self.properties.metrics_rolling_stats_window_ms = v;
        self
    }

    pub fn metrics_rolling_stats_buckets(mut self, v: usize) -> Self {
        self.properties.metrics_rolling_stats_buckets = v;
        self
    }

    pub fn metrics_rolling_percentile_enabled(mut self, v: bool) -> Self {
        self.properties.metrics_rolling_percentile_enabled = v;
        self
    }

    pub fn metrics_rolling_percentile_window_ms(mut self, v: i64) -> Self {
        self.properties.metrics_rolling_percentile_window_ms = v;
        self
    }

    pub fn metrics_rolling_percentile_buckets(mut self, v: usize) -> Self {
        self.properties.metrics_rolling_percentile_buckets = v;
        self
    }

    pub fn metrics_rolling_percentile_bucket_size(mut self, v: usize) -> Self {
        self.properties.metrics_rolling_percentile_bucket_size = v;
        self
    }

    pub fn metrics_health_snapshot_interval_ms(mut self, v: i64) -> Self {
        self.properties.metrics_health_snapshot_interval_ms = v;
        self
    }

    pub fn circuit_breaker_enabled(mut self, v: bool) -> Self {
        self.properties.circuit_breaker_enabled = v;
        self
    }

    pub fn circuit_breaker_request_volume_threshold(mut self, v: i64) -> Self {
        self.properties.circuit_breaker_request_volume_threshold = v;
        self
    }

    pub fn circuit_breaker_sleep_window_ms(mut self, v: i64) -> Self {
        self.properties.circuit_breaker_sleep_window_ms = v;
        self
    }

    pub fn circuit_breaker_error_threshold_percent(mut self, v: i64) -> Self {
        self.properties.circuit_breaker_error_threshold_percent = v;
        self
    }

    pub fn circuit_breaker_force_open(mut self, v: bool) -> Self {
        self.properties.circuit_breaker_force_open = v;
        self
    }

    pub fn circuit_breaker_force_closed(mut self, v: bool) -> Self {
        self.properties.circuit_breaker_force_closed = v;
        self
    }

    pub fn execution_isolation_strategy(mut self, v: IsolationStrategy) -> Self {
        self.properties.execution_isolation_strategy = v;
        self
    }

    pub fn execution_isolation_thread_timeout_ms(mut self, v: u64) -> Self {
        self.properties.execution_isolation_thread_timeout_ms = v;
        self
    }

    pub fn execution_isolation_thread_interrupt_on_timeout(mut self, v: bool) -> Self {
        self.properties.execution_isolation_thread_interrupt_on_timeout = v;
        self
    }

    pub fn execution_isolation_semaphore_max_concurrent(mut self, v: usize) -> Self {
        self.properties.execution_isolation_semaphore_max_concurrent = v;
        self
    }

    pub fn fallback_isolation_semaphore_max_concurrent(mut self, v: usize) -> Self {
        self.properties.fallback_isolation_semaphore_max_concurrent = v;
        self
    }

    pub fn fallback_enabled(mut self, v: bool) -> Self {
        self.properties.fallback_enabled = v;
        self
    }

    pub fn request_cache_enabled(mut self, v: bool) -> Self {
        self.properties.request_cache_enabled = v;
        self
    }

    pub fn request_log_enabled(mut self, v: bool) -> Self {
        self.properties.request_log_enabled = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let p = Properties::default();
        assert_eq!(p.metrics_rolling_stats_window_ms, 10_000);
        assert_eq!(p.metrics_rolling_stats_buckets, 10);
        assert_eq!(p.metrics_rolling_percentile_buckets, 6);
        assert_eq!(p.circuit_breaker_request_volume_threshold, 20);
        assert_eq!(p.circuit_breaker_error_threshold_percent, 50);
        assert!(p.fallback_enabled);
        assert!(p.request_cache_enabled);
    }

    #[test]
    fn builder_overrides_only_named_fields() {
        let p = PropertiesBuilder::new()
            .circuit_breaker_request_volume_threshold(5)
            .circuit_breaker_error_threshold_percent(50)
            .build();
        assert_eq!(p.circuit_breaker_request_volume_threshold, 5);
        assert_eq!(p.circuit_breaker_error_threshold_percent, 50);
        assert_eq!(p.metrics_rolling_stats_buckets, 10);
    }
}
