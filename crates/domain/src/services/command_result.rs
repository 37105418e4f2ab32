//! Agent-reported command outcomes and their effect on the device.

use base64::Engine;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

use super::alerts::AlertService;
use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::command_queue::{CommandQueue, ResultOutcome};
use super::context::ServiceContext;
use crate::error::{DomainError, DomainResult};
use crate::models::command::CommandResultRequest;
use crate::models::{AlertType, AuditAction, CommandOutcome, CommandType, ManagementState, NewAlert};

/// Management state an executed command moves the device to.
pub fn management_effect(command_type: CommandType, outcome: CommandOutcome) -> Option<ManagementState> {
    match (outcome, command_type) {
        (CommandOutcome::Executed, CommandType::Lock) => Some(ManagementState::Locked),
        (CommandOutcome::Executed, CommandType::Unlock) => Some(ManagementState::Unrestricted),
        (CommandOutcome::Executed, CommandType::Wipe) => Some(ManagementState::Wiped),
        _ => None,
    }
}

fn validate_screenshot(result: Option<&JsonValue>) -> DomainResult<()> {
    let image = result
        .and_then(|r| r.get("image"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| DomainError::Validation("result.image: screenshot result requires an image".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(image)
        .map_err(|e| DomainError::Validation(format!("result.image: invalid base64 ({})", e)))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CommandResultService {
    ctx: ServiceContext,
    commands: CommandQueue,
    alerts: AlertService,
    audit: AuditService,
}

impl CommandResultService {
    pub fn new(
        ctx: ServiceContext,
        commands: CommandQueue,
        alerts: AlertService,
        audit: AuditService,
    ) -> Self {
        Self {
            ctx,
            commands,
            alerts,
            audit,
        }
    }

    pub async fn report_result(
        &self,
        device_id: Uuid,
        command_id: Uuid,
        request: CommandResultRequest,
    ) -> DomainResult<ResultOutcome> {
        request.validate()?;
        let _guard = self.ctx.lock_device(device_id).await?;

        let command = self.commands.get(command_id).await?;
        if command.device_id != device_id {
            tracing::warn!(
                command_id = %command_id,
                device_id = %device_id,
                "Result reported for another device's command"
            );
            return Err(DomainError::Forbidden(format!(
                "command {} does not belong to this device",
                command_id
            )));
        }
        let command_type = command.command_type;
        let outcome = request.outcome;
        if command_type == CommandType::Screenshot && outcome == CommandOutcome::Executed {
            validate_screenshot(request.result.as_ref())?;
        }

        let effect = management_effect(command_type, outcome);
        let result = self
            .commands
            .complete(command, outcome, request.result, request.error, effect)
            .await?;
        if !result.changed {
            return Ok(result);
        }

        if let Some(state) = effect {
            tracing::info!(device_id = %device_id, management = %state, "Device management state changed");
        }
        self.audit
            .record(
                AuditLogBuilder::new(&Actor::agent(device_id), AuditAction::CommandResult)
                    .on_target("command", command_id)
                    .with_details(json!({
                        "type": command_type,
                        "outcome": outcome,
                        "error": result.command.failure_reason,
                    })),
            )
            .await;

        if outcome == CommandOutcome::Failed {
            let reason = result
                .command
                .failure_reason
                .clone()
                .unwrap_or_default();
            let alert = NewAlert {
                device_id,
                alert_type: AlertType::CommandFailed,
                severity: command_type.failure_severity(),
                description: format!("{} command failed: {}", command_type.label(), reason),
                latitude: None,
                longitude: None,
                geofence_id: None,
            };
            // The result is already committed.
            if let Err(e) = self.alerts.raise(alert).await {
                tracing::error!(command_id = %command_id, error = %e, "Failed to raise command_failed alert");
            }
        }
        Ok(result)
    }
}
