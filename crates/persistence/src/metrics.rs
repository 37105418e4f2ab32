//! Query timing and connection pool gauges.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Records the duration of one named query.
pub fn record_query_duration(query_name: &'static str, duration_secs: f64) {
    histogram!("database_query_duration_seconds", "query" => query_name).record(duration_secs);
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    pub fn active(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

/// Publishes pool gauges. Called periodically by the pool metrics job.
pub fn record_pool_metrics(pool: &PgPool) -> PoolStats {
    let stats = PoolStats::of(pool);
    gauge!("database_connections_active").set(stats.active() as f64);
    gauge!("database_connections_idle").set(stats.idle as f64);
    gauge!("database_connections_total").set(f64::from(stats.size));
    stats
}

/// Times a query from construction to [`QueryTimer::finish`].
///
/// ```ignore
/// let timer = QueryTimer::new("find_device");
/// let row = sqlx::query_as::<_, DeviceEntity>(..).fetch_optional(&pool).await;
/// timer.finish(&row)
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    /// Records the elapsed time and counts failed queries, passing the
    /// result through.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
        if result.is_err() {
            counter!("database_query_errors_total", "query" => self.query_name).increment(1);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_passes_result_through() {
        let ok: Result<u8, &str> = QueryTimer::new("q").finish(Ok(3));
        assert_eq!(ok, Ok(3));
        let err: Result<u8, &str> = QueryTimer::new("q").finish(Err("boom"));
        assert_eq!(err, Err("boom"));
    }

    #[test]
    fn test_pool_stats_active() {
        let stats = PoolStats { size: 10, idle: 4 };
        assert_eq!(stats.active(), 6);
        let drained = PoolStats { size: 2, idle: 5 };
        assert_eq!(drained.active(), 0);
    }
}
