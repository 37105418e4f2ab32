//! Agent-facing endpoints: registration, check-in and result reporting.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::command::{CommandResultRequest, CommandResultResponse};
use domain::models::device::{RegisterAgentRequest, RegisterAgentResponse};
use domain::models::location::PingRequest;
use domain::models::CheckinResponse;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AgentAuth, ClientIp};
use crate::middleware::metrics;

/// POST /agent/register
///
/// Public. Creates the device (or rotates the token of a known serial) and
/// returns the bearer token once.
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip_address): ClientIp,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<Json<RegisterAgentResponse>, ApiError> {
    let response = state
        .services
        .registration
        .register(request, ip_address)
        .await?;
    metrics::record_device_registered();
    Ok(Json(response))
}

/// POST /agent/ping
pub async fn ping(
    State(state): State<AppState>,
    AgentAuth { device }: AgentAuth,
    Json(ping): Json<PingRequest>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let outcome = state.services.checkin.checkin(device.id, ping).await?;

    metrics::record_checkin(outcome.command.is_some());
    if let Some(command) = &outcome.command {
        metrics::record_command_dispatched(command.command_type);
    }
    for alert in &outcome.alerts {
        metrics::record_alert_raised(alert.alert_type);
    }

    Ok(Json(outcome.response))
}

/// POST /agent/commands/:command_id/result
pub async fn report_result(
    State(state): State<AppState>,
    AgentAuth { device }: AgentAuth,
    Path(command_id): Path<Uuid>,
    Json(request): Json<CommandResultRequest>,
) -> Result<Json<CommandResultResponse>, ApiError> {
    let outcome = state
        .services
        .results
        .report_result(device.id, command_id, request)
        .await?;

    Ok(Json(CommandResultResponse {
        command_id: outcome.command.id,
        status: outcome.command.status,
        changed: outcome.changed,
    }))
}
