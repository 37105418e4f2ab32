//! Admin geofence endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::geofence::{
    CreateGeofenceRequest, ListGeofencesQuery, ListGeofencesResponse, UpdateGeofenceRequest,
};
use domain::models::Geofence;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;

/// GET /admin/geofences?include_inactive
pub async fn list_geofences(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(query): Query<ListGeofencesQuery>,
) -> Result<Json<ListGeofencesResponse>, ApiError> {
    let geofences = state.services.geofences.list(query.include_inactive).await?;
    Ok(Json(ListGeofencesResponse {
        total: geofences.len(),
        geofences,
    }))
}

/// POST /admin/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    admin: AdminAuth,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<Geofence>), ApiError> {
    let fence = state
        .services
        .geofences
        .create(&admin.actor(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(fence)))
}

/// GET /admin/geofences/:geofence_id
pub async fn get_geofence(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(geofence_id): Path<Uuid>,
) -> Result<Json<Geofence>, ApiError> {
    Ok(Json(state.services.geofences.get(geofence_id).await?))
}

/// PUT /admin/geofences/:geofence_id
///
/// Partial update; omitted fields keep their values.
pub async fn update_geofence(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(geofence_id): Path<Uuid>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<Geofence>, ApiError> {
    let fence = state
        .services
        .geofences
        .update(&admin.actor(), geofence_id, request)
        .await?;
    Ok(Json(fence))
}
