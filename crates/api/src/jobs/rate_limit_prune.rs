//! Drops idle rate limiter entries so the key map does not grow unbounded.

use std::sync::Arc;
use std::time::Duration;

use super::scheduler::Job;
use crate::middleware::RateLimiterState;

pub struct RateLimitPruneJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimitPruneJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitPruneJob {
    fn name(&self) -> &'static str {
        "rate_limit_prune"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(300)
    }

    async fn execute(&self) -> Result<(), String> {
        let before = self.limiter.tracked_keys();
        self.limiter.prune();
        tracing::debug!(before, after = self.limiter.tracked_keys(), "Rate limiter pruned");
        Ok(())
    }
}
