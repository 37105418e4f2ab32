//! Per-principal rate limiting for admin routes.
//!
//! Must run after [`super::auth::require_admin`] so the principal is in the
//! request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::AdminPrincipal;
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use serde_json::json;
use std::num::NonZeroU32;

use crate::app::AppState;
use crate::middleware::trace_id::get_request_id;

pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<i64>,
    clock: DefaultClock,
    rate_limit_per_minute: NonZeroU32,
}

impl RateLimiterState {
    /// `None` when the limit is 0 (limiting disabled).
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            clock: DefaultClock::default(),
            rate_limit_per_minute: per_minute,
        })
    }

    pub fn limit(&self) -> u32 {
        self.rate_limit_per_minute.get()
    }

    /// `Err(retry_after_secs)` once the key has used its quota.
    pub fn check(&self, key_id: i64) -> Result<(), u64> {
        self.limiter.check_key(&key_id).map_err(|not_until| {
            not_until
                .wait_time_from(self.clock.now())
                .as_secs()
                .max(1)
        })
    }

    /// Drops state for keys that are back at full quota.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let principal = req.extensions().get::<AdminPrincipal>().cloned();
    let (Some(limiter), Some(principal)) = (state.rate_limiter.as_ref(), principal) else {
        return next.run(req).await;
    };

    if let Err(retry_after) = limiter.check(principal.key_id) {
        tracing::warn!(
            request_id = %get_request_id(req.extensions()),
            key_prefix = %principal.key_prefix,
            retry_after,
            "Rate limit exceeded"
        );
        return rate_limited_response(limiter.limit(), retry_after);
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retry_after": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
