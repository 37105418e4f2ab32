//! Admin command endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::command::{
    CommandHistoryQuery, CommandResponse, EnqueueCommandRequest, EnqueueCommandResponse,
};
use domain::models::{CommandType, Page, PageRequest};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;
use crate::middleware::metrics;
use crate::routes::optional_json;

/// POST /commands/:command_type/:device_id
///
/// Returns 201 even when in-flight commands were superseded; the
/// displaced ids and a warning are part of the body.
pub async fn enqueue_command(
    State(state): State<AppState>,
    admin: AdminAuth,
    Path((command_type, device_id)): Path<(String, Uuid)>,
    body: Bytes,
) -> Result<(StatusCode, Json<EnqueueCommandResponse>), ApiError> {
    let command_type: CommandType = command_type.parse().map_err(ApiError::Validation)?;
    let request: EnqueueCommandRequest = optional_json(&body)?;

    let outcome = state
        .services
        .commands
        .enqueue(&admin.actor(), device_id, command_type, request.payload)
        .await?;
    metrics::record_command_enqueued(command_type);

    let warning = outcome.warning();
    Ok((
        StatusCode::CREATED,
        Json(EnqueueCommandResponse {
            command_id: outcome.command.id,
            status: outcome.command.status,
            superseded: outcome.superseded,
            warning,
        }),
    ))
}

/// GET /commands/history/:device_id
pub async fn command_history(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(device_id): Path<Uuid>,
    Query(query): Query<CommandHistoryQuery>,
) -> Result<Json<Page<CommandResponse>>, ApiError> {
    let page = PageRequest::from_query(query.limit, query.cursor.as_deref())?;
    let history = state.services.commands.history(device_id, &page).await?;
    Ok(Json(history.map(CommandResponse::from)))
}

/// GET /commands/:command_id
pub async fn get_command(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(command_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = state.services.commands.get(command_id).await?;
    Ok(Json(command.into()))
}
