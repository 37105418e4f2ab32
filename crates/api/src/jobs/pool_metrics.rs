//! Periodic connection pool gauges (Postgres only).

use sqlx::PgPool;
use std::time::Duration;

use super::scheduler::{interval_from_secs, Job};

pub struct PoolMetricsJob {
    pool: PgPool,
    interval: Duration,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval: interval_from_secs(interval_secs),
        }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let stats = persistence::metrics::record_pool_metrics(&self.pool);
        tracing::trace!(size = stats.size, idle = stats.idle, active = stats.active(), "Pool metrics recorded");
        Ok(())
    }
}
