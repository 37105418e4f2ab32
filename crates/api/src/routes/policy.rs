//! Fleet policy endpoints.

use axum::{extract::State, Json};
use domain::models::fleet_policy::UpdatePolicyRequest;
use domain::models::FleetPolicy;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;

/// GET /admin/policy
pub async fn get_policy(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<FleetPolicy>, ApiError> {
    Ok(Json(state.services.policy.current().await?))
}

/// PUT /admin/policy
///
/// `expected_version` must match the current version, else 409.
pub async fn update_policy(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<Json<FleetPolicy>, ApiError> {
    let policy = state
        .services
        .policy
        .update(&admin.actor(), request)
        .await?;
    Ok(Json(policy))
}
