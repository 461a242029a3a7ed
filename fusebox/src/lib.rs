//! Latency and fault-tolerance substrate for wrapping risky dependency
//! calls with isolation, timeouts, fallbacks, circuit breaking, and rolling
//! performance metrics — modeled on the Netflix Hystrix pattern.
//!
//! The core pipeline: [`command::CommandExecutor::execute`] checks
//! [`breaker::CircuitBreaker::allow_request`], dispatches `run()` through a
//! [`pool::Pool`] (or a semaphore) under a timeout, marks the outcome on
//! [`metrics::CommandMetrics`], and falls back on failure, timeout,
//! rejection, or an open breaker.

pub mod breaker;
pub mod clock;
pub mod command;
pub mod error;
pub mod events;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod pool;
pub mod properties;
pub mod registry;
pub mod rolling;

pub use breaker::{BreakerState, CircuitBreaker};
pub use clock::{Clock, MockClock, SystemClock};
pub use command::{Command, CommandExecutor, NoopRequestCache, RequestCache};
pub use error::{CommandError, ConfigError, TypeMismatch};
pub use events::{CounterKind, EventKind, MaxKind};
pub use keys::{CommandKey, GroupKey, PoolKey};
pub use metrics::{CommandMetrics, HealthSnapshot, PoolMetrics};
pub use notifier::{EventNotifier, NoopEventNotifier};
pub use pool::Pool;
pub use properties::{IsolationStrategy, Properties, PropertiesBuilder};
pub use registry::Registry;
pub use rolling::number::RollingNumber;
pub use rolling::percentile::{PercentileSnapshot, RollingPercentile};
