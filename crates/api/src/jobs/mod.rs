//! Background job scheduler and job implementations.

mod offline_sweep;
mod pool_metrics;
mod rate_limit_prune;
mod scheduler;

pub use offline_sweep::OfflineSweepJob;
pub use pool_metrics::PoolMetricsJob;
pub use rate_limit_prune::RateLimitPruneJob;
pub use scheduler::{interval_from_secs, Job, JobScheduler};
