//! Admin alert endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use domain::models::alert::{AlertActionRequest, AlertResponse, ListAlertsQuery};
use domain::models::{Page, PageRequest};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;
use crate::routes::optional_json;

/// GET /admin/alerts?device_id&status&alert_type&limit&cursor
pub async fn list_alerts(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<Page<AlertResponse>>, ApiError> {
    let page = PageRequest::from_query(query.limit, query.cursor.as_deref())?;
    let alerts = state.services.alerts.list(&query.filter(), &page).await?;
    Ok(Json(alerts.map(AlertResponse::from)))
}

/// POST /admin/alerts/:alert_id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(alert_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<AlertResponse>, ApiError> {
    let request: AlertActionRequest = optional_json(&body)?;
    request.validate()?;
    let alert = state
        .services
        .alerts
        .acknowledge(&admin.actor(), alert_id, request.notes)
        .await?;
    Ok(Json(alert.into()))
}

/// POST /admin/alerts/:alert_id/resolve
pub async fn resolve_alert(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path(alert_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<AlertResponse>, ApiError> {
    let request: AlertActionRequest = optional_json(&body)?;
    request.validate()?;
    let alert = state
        .services
        .alerts
        .resolve(&admin.actor(), alert_id, request.notes)
        .await?;
    Ok(Json(alert.into()))
}
