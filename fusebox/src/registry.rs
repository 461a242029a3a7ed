//! Keyed get-or-create registries (§9): replaces the reference source's
//! per-key synthesized-subclass pattern with plain value objects colocated
//! in a concurrent map, identity coming from the registry rather than the
//! type. Creation is idempotent — a second `get_or_create` for the same key
//! returns the existing instance rather than building a second one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::breaker::CircuitBreaker;
use crate::clock::Clock;
use crate::error::ConfigError;
use crate::keys::{CommandKey, PoolKey};
use crate::metrics::CommandMetrics;
use crate::notifier::EventNotifier;
use crate::pool::Pool;
use crate::properties::Properties;

/// One `CommandMetrics` + one `CircuitBreaker` per [`CommandKey`], one `Pool`
/// per [`PoolKey`]. A command's pool is looked up independently so that
/// multiple command keys sharing a pool key genuinely share one `Pool`.
pub struct Registry {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn EventNotifier>,
    command_metrics: RwLock<HashMap<CommandKey, Arc<CommandMetrics>>>,
    breakers: RwLock<HashMap<CommandKey, Arc<CircuitBreaker>>>,
    pools: RwLock<HashMap<PoolKey, Arc<Pool>>>,
}

impl Registry {
    pub fn new(clock: Arc<dyn Clock>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self {
            clock,
            notifier,
            command_metrics: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn command_metrics(
        &self,
        key: &CommandKey,
        properties: &Properties,
    ) -> Result<Arc<CommandMetrics>, ConfigError> {
        if let Some(existing) = self.command_metrics.read().unwrap().get(key) {
            return Ok(Arc::clone(existing));
        }
        let mut guard = self.command_metrics.write().unwrap();
        if let Some(existing) = guard.get(key) {
            return Ok(Arc::clone(existing));
        }
        let metrics = Arc::new(CommandMetrics::new(
            key.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            properties,
        )?);
        guard.insert(key.clone(), Arc::clone(&metrics));
        Ok(metrics)
    }

    pub fn circuit_breaker(
        &self,
        key: &CommandKey,
        properties: &Properties,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        if let Some(existing) = self.breakers.read().unwrap().get(key) {
            return Ok(Arc::clone(existing));
        }
        let metrics = self.command_metrics(key, properties)?;
        let mut guard = self.breakers.write().unwrap();
        if let Some(existing) = guard.get(key) {
            return Ok(Arc::clone(existing));
        }
        let breaker = Arc::new(CircuitBreaker::new(metrics, properties));
        guard.insert(key.clone(), Arc::clone(&breaker));
        Ok(breaker)
    }

    pub fn pool(&self, key: &PoolKey, max_workers: usize, queue_capacity: usize) -> Arc<Pool> {
        if let Some(existing) = self.pools.read().unwrap().get(key) {
            return Arc::clone(existing);
        }
        let mut guard = self.pools.write().unwrap();
        if let Some(existing) = guard.get(key) {
            return Arc::clone(existing);
        }
        let pool = Arc::new(Pool::new(max_workers, queue_capacity));
        guard.insert(key.clone(), Arc::clone(&pool));
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::notifier::NoopEventNotifier;

    fn registry() -> Registry {
        Registry::new(Arc::new(MockClock::new()), Arc::new(NoopEventNotifier))
    }

    #[test]
    fn command_metrics_is_a_singleton_per_key() {
        let registry = registry();
        let key = CommandKey::new("GetUser");
        let props = Properties::default();
        let a = registry.command_metrics(&key, &props).unwrap();
        let b = registry.command_metrics(&key, &props).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_get_distinct_metrics() {
        let registry = registry();
        let props = Properties::default();
        let a = registry.command_metrics(&CommandKey::new("A"), &props).unwrap();
        let b = registry.command_metrics(&CommandKey::new("B"), &props).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn circuit_breaker_shares_the_registrys_command_metrics() {
        let registry = registry();
        let key = CommandKey::new("GetUser");
        let props = Properties::default();
        let metrics = registry.command_metrics(&key, &props).unwrap();
        let breaker = registry.circuit_breaker(&key, &props).unwrap();
        metrics.health_counts();
        assert!(breaker.allow_request());
    }

    #[test]
    fn pool_is_a_singleton_per_pool_key() {
        let registry = registry();
        let key = PoolKey::new("GetUserGroup");
        let a = registry.pool(&key, 5, 5);
        let b = registry.pool(&key, 5, 5);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
