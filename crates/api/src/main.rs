use anyhow::{Context, Result};
use domain::store::memory::MemoryStore;
use domain::store::TrackingStore;
use persistence::PgStore;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use fleet_tracker_api::app::{build_services, create_app, AppState};
use fleet_tracker_api::config::Config;
use fleet_tracker_api::jobs::{JobScheduler, OfflineSweepJob, PoolMetricsJob, RateLimitPruneJob};
use fleet_tracker_api::middleware::{init_metrics, logging::init_logging};

const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_logging(&config.logging).context("failed to initialize logging")?;
    init_metrics().context("failed to install metrics recorder")?;

    info!("Starting Fleet Tracker API v{}", env!("CARGO_PKG_VERSION"));

    let (store, pool, backend): (Arc<dyn TrackingStore>, Option<PgPool>, &'static str) =
        if config.database.is_in_memory() {
            warn!("database.url is empty; using the in-memory store (state is lost on restart)");
            (Arc::new(MemoryStore::new()), None, "memory")
        } else {
            let pool = persistence::db::create_pool(&config.database.pool_settings())
                .await
                .context("failed to connect to database")?;
            persistence::db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            (Arc::new(PgStore::new(pool.clone())), Some(pool), "postgres")
        };

    let services = build_services(&config, store)
        .await
        .context("failed to initialize services")?;

    let addr = config.socket_addr()?;
    let state = AppState::new(config, services, backend);

    let mut scheduler = JobScheduler::new();
    scheduler.register(OfflineSweepJob::new(
        state.services.sweep.clone(),
        state.config.jobs.offline_sweep_interval_secs,
    ));
    if let Some(pool) = pool {
        scheduler.register(PoolMetricsJob::new(
            pool,
            state.config.jobs.pool_metrics_interval_secs,
        ));
    }
    if let Some(limiter) = &state.rate_limiter {
        scheduler.register(RateLimitPruneJob::new(limiter.clone()));
    }
    scheduler.start();

    let app = create_app(state);
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
