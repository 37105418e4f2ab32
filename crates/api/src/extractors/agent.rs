//! Agent bearer-token extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use domain::models::Device;

use crate::app::AppState;
use crate::error::ApiError;

/// The active device behind `Authorization: Bearer fta_...`.
#[derive(Debug, Clone)]
pub struct AgentAuth {
    pub device: Device,
}

#[async_trait]
impl FromRequestParts<AppState> for AgentAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing or malformed bearer token".to_string()))?;

        let device = state
            .services
            .registration
            .authenticate_agent(bearer.token())
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Agent authentication failed");
                ApiError::from(e)
            })?;
        Ok(Self { device })
    }
}
