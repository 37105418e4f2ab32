//! Admin authentication middleware.
//!
//! Validates `X-API-Key` against stored admin keys and places the resulting
//! [`AdminPrincipal`] in request extensions for handlers and the rate limiter.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use domain::services::AdminPrincipal;

use crate::app::AppState;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "X-API-Key";

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let api_key = match req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        Some(key) => key.to_string(),
        None => {
            return ApiError::Unauthorized("Invalid or missing API key".to_string()).into_response()
        }
    };

    match state.services.registration.authenticate_admin(&api_key).await {
        Ok(principal) => {
            tracing::debug!(key_prefix = %principal.key_prefix, "Admin authenticated");
            req.extensions_mut().insert::<AdminPrincipal>(principal);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(error = %err, "Admin authentication failed");
            ApiError::from(err).into_response()
        }
    }
}
