pub mod command_metrics;
pub mod health;
pub mod pool_metrics;

pub use command_metrics::CommandMetrics;
pub use health::HealthSnapshot;
pub use pool_metrics::PoolMetrics;
