use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{FleetServices, RegistrationSettings, ServiceContext};
use domain::store::TrackingStore;
use domain::{DomainError, DomainResult};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_admin,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{agent, alerts, audit_logs, commands, devices, geofences, health, policy};

#[derive(Clone)]
pub struct AppState {
    pub services: FleetServices,
    pub config: Arc<Config>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    /// `postgres` or `memory`, reported by /health.
    pub store_backend: &'static str,
}

impl AppState {
    pub fn new(config: Config, services: FleetServices, store_backend: &'static str) -> Self {
        let rate_limiter = RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);
        Self {
            services,
            config: Arc::new(config),
            rate_limiter,
            store_backend,
        }
    }
}

/// Wires the services over `store`, seeds policy version 1 if the store has
/// none and stores the bootstrap admin key when one is configured.
pub async fn build_services(
    config: &Config,
    store: Arc<dyn TrackingStore>,
) -> DomainResult<FleetServices> {
    let ctx = ServiceContext::new(store, config.core.store_timeout());
    let services = FleetServices::new(
        ctx,
        RegistrationSettings {
            token_secret: config.agent.token_secret.clone(),
            registration_code: config.registration_code(),
        },
    );

    let settings = config
        .policy
        .settings()
        .map_err(|e| DomainError::Validation(e.to_string()))?;
    let policy = services.policy.seed(settings).await?;
    tracing::info!(version = policy.version, "Fleet policy loaded");

    if let Some(key) = config.bootstrap_admin_key() {
        services.registration.ensure_admin_key(key, "bootstrap").await?;
    }
    Ok(services)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Development: allow any origin
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Agent routes authenticate per handler through the bearer extractor.
    let agent_routes = Router::new()
        .route("/agent/register", post(agent::register))
        .route("/agent/ping", post(agent::ping))
        .route(
            "/agent/commands/:command_id/result",
            post(agent::report_result),
        );

    // Admin routes. Auth runs first (outermost route_layer), then rate
    // limiting keyed by the authenticated key. The first segment after
    // /commands/ shares one parameter name: a command id on GET, a command
    // type on POST.
    let admin_routes = Router::new()
        .route(
            "/commands/history/:device_id",
            get(commands::command_history),
        )
        .route(
            "/commands/:command/:device_id",
            post(commands::enqueue_command),
        )
        .route("/commands/:command", get(commands::get_command))
        .route("/admin/devices", get(devices::list_devices))
        .route(
            "/admin/devices/:device_id",
            get(devices::get_device)
                .patch(devices::update_device)
                .delete(devices::deactivate_device),
        )
        .route(
            "/admin/devices/:device_id/locations",
            get(devices::device_locations),
        )
        .route(
            "/admin/geofences",
            get(geofences::list_geofences).post(geofences::create_geofence),
        )
        .route(
            "/admin/geofences/:geofence_id",
            get(geofences::get_geofence).put(geofences::update_geofence),
        )
        .route("/admin/alerts", get(alerts::list_alerts))
        .route(
            "/admin/alerts/:alert_id/acknowledge",
            post(alerts::acknowledge_alert),
        )
        .route("/admin/alerts/:alert_id/resolve", post(alerts::resolve_alert))
        .route(
            "/admin/policy",
            get(policy::get_policy).put(policy::update_policy),
        )
        .route("/admin/audit-logs", get(audit_logs::list_audit_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
