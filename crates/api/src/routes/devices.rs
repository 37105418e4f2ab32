//! Admin device endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::device::{
    DeviceResponse, ListDevicesQuery, ListDevicesResponse, UpdateDeviceRequest,
};
use domain::models::location::{LocationHistoryResponse, RecentLocationsQuery};
use domain::store::DeviceFilter;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;

/// GET /admin/devices
pub async fn list_devices(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<ListDevicesResponse>, ApiError> {
    let filter = DeviceFilter {
        department: query.department,
        include_inactive: query.include_inactive,
    };
    let devices = state.services.devices.list(&filter).await?;
    Ok(Json(devices.into()))
}

/// GET /admin/devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(device_id): Path<Uuid>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = state.services.devices.get(device_id).await?;
    Ok(Json(device.into()))
}

/// PATCH /admin/devices/:device_id
///
/// Updates assignment metadata only; connectivity and management state are
/// owned by check-ins and command results.
pub async fn update_device(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(device_id): Path<Uuid>,
    Json(request): Json<UpdateDeviceRequest>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = state
        .services
        .devices
        .update_assignment(&admin.actor(), device_id, request)
        .await?;
    Ok(Json(device.into()))
}

/// DELETE /admin/devices/:device_id
///
/// Soft delete. Fails with 409 while commands are pending or sent.
pub async fn deactivate_device(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(device_id): Path<Uuid>,
) -> Result<Json<DeviceResponse>, ApiError> {
    let device = state
        .services
        .devices
        .deactivate(&admin.actor(), device_id)
        .await?;
    Ok(Json(device.into()))
}

/// GET /admin/devices/:device_id/locations?limit
pub async fn device_locations(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(device_id): Path<Uuid>,
    Query(query): Query<RecentLocationsQuery>,
) -> Result<Json<LocationHistoryResponse>, ApiError> {
    let locations = state
        .services
        .devices
        .recent_locations(device_id, query.limit())
        .await?;
    Ok(Json(LocationHistoryResponse {
        device_id,
        locations,
    }))
}
