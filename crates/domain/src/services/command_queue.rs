//! Per-device command queue.
//!
//! Commands are delivered in `created_at` order (ties broken by id) and move
//! `pending -> sent -> executed | failed` exactly once.

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use super::policy::PolicyService;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    AuditAction, Command, CommandCompletion, CommandOutcome, CommandStatus, CommandType,
    ManagementState, NewCommand, Page, PageRequest,
};
use crate::store::{CommandStore, DeviceStore};

/// Result of a successful enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    pub command: Command,
    /// In-flight commands this one displaced.
    pub superseded: Vec<Uuid>,
}

impl EnqueueOutcome {
    /// Conflict warning shown to the admin when something was superseded.
    pub fn warning(&self) -> Option<String> {
        if self.superseded.is_empty() {
            return None;
        }
        Some(format!(
            "{} superseded {} in-flight command(s)",
            self.command.command_type,
            self.superseded.len()
        ))
    }
}

/// Result of recording an agent-reported outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultOutcome {
    pub command: Command,
    /// False when the report repeated an already recorded outcome.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct CommandQueue {
    ctx: ServiceContext,
    policy: PolicyService,
    audit: AuditService,
}

impl CommandQueue {
    pub fn new(ctx: ServiceContext, policy: PolicyService, audit: AuditService) -> Self {
        Self { ctx, policy, audit }
    }

    /// Queues a command for a device, superseding conflicting in-flight ones.
    pub async fn enqueue(
        &self,
        actor: &Actor,
        device_id: Uuid,
        command_type: CommandType,
        payload: Option<JsonValue>,
    ) -> DomainResult<EnqueueOutcome> {
        let _guard = self.ctx.lock_device(device_id).await?;

        let device = self
            .ctx
            .bounded("find_device", self.ctx.store.find_device(device_id))
            .await?
            .filter(|d| d.active)
            .ok_or_else(|| DomainError::NotFound(format!("device {}", device_id)))?;
        if device.is_wiped() {
            return Err(DomainError::InvalidStateTransition(format!(
                "device {} has been wiped",
                device_id
            )));
        }

        let payload = payload.filter(|p| !p.is_null());
        command_type.validate_payload(payload.as_ref())?;

        let policy = self.policy.current().await?;
        match command_type {
            CommandType::Wipe if !policy.settings.remote_wipe_enabled => {
                return Err(DomainError::Forbidden(
                    "remote wipe is disabled by fleet policy".to_string(),
                ));
            }
            CommandType::Screenshot if !policy.settings.screenshot_enabled => {
                return Err(DomainError::Forbidden(
                    "screenshots are disabled by fleet policy".to_string(),
                ));
            }
            _ => {}
        }

        let supersede: Vec<CommandType> = CommandType::ALL
            .into_iter()
            .filter(|other| command_type.supersedes(*other))
            .collect();
        let new = NewCommand {
            id: Uuid::new_v4(),
            device_id,
            command_type,
            payload,
            issued_by: actor.label(),
            created_at: self.ctx.now(),
        };
        let (command, superseded) = self
            .ctx
            .bounded(
                "insert_command",
                self.ctx.store.insert_command(new, &supersede),
            )
            .await?;

        tracing::info!(
            command_id = %command.id,
            device_id = %device_id,
            command_type = %command_type,
            superseded = superseded.len(),
            "Command queued"
        );
        if !superseded.is_empty() {
            tracing::warn!(
                device_id = %device_id,
                superseded = ?superseded,
                "In-flight commands superseded"
            );
        }

        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::CommandEnqueue)
                    .on_target("command", command.id)
                    .with_details(json!({
                        "device_id": device_id,
                        "type": command_type,
                        "superseded": superseded,
                    })),
            )
            .await;

        Ok(EnqueueOutcome {
            command,
            superseded,
        })
    }

    /// Atomically takes the oldest pending command and marks it sent. While
    /// the device is locked only `unlock` is eligible.
    ///
    /// Callers hold the device lock.
    pub async fn dequeue_next(
        &self,
        device_id: Uuid,
        locked: bool,
    ) -> DomainResult<Option<Command>> {
        let command = self
            .ctx
            .bounded(
                "dequeue_next_command",
                self.ctx
                    .store
                    .dequeue_next_command(device_id, locked, self.ctx.now()),
            )
            .await?;
        if let Some(command) = &command {
            tracing::info!(
                command_id = %command.id,
                device_id = %device_id,
                command_type = %command.command_type,
                "Command dispatched"
            );
        }
        Ok(command)
    }

    /// Records `sent -> executed | failed`. Repeating an already recorded
    /// outcome is a no-op with `changed = false`.
    pub async fn record_result(
        &self,
        command_id: Uuid,
        outcome: CommandOutcome,
        result_payload: Option<JsonValue>,
        failure_reason: Option<String>,
    ) -> DomainResult<ResultOutcome> {
        let command = self.get(command_id).await?;
        self.complete(command, outcome, result_payload, failure_reason, None)
            .await
    }

    /// Like `record_result`, also applying `effect` to the device's
    /// management state in the same store operation.
    pub(crate) async fn complete(
        &self,
        command: Command,
        outcome: CommandOutcome,
        result_payload: Option<JsonValue>,
        failure_reason: Option<String>,
        effect: Option<ManagementState>,
    ) -> DomainResult<ResultOutcome> {
        let mut command = command;
        if command.status == CommandStatus::Sent {
            let completion = CommandCompletion {
                outcome,
                result_payload,
                failure_reason: match outcome {
                    CommandOutcome::Failed => {
                        Some(failure_reason.unwrap_or_else(|| "agent reported failure".to_string()))
                    }
                    CommandOutcome::Executed => None,
                },
                completed_at: self.ctx.now(),
            };
            let updated = self
                .ctx
                .bounded(
                    "complete_command",
                    self.ctx.store.complete_command(command.id, &completion, effect),
                )
                .await?;
            match updated {
                Some(updated) => {
                    tracing::info!(
                        command_id = %updated.id,
                        device_id = %updated.device_id,
                        status = %updated.status,
                        "Command completed"
                    );
                    return Ok(ResultOutcome {
                        command: updated,
                        changed: true,
                    });
                }
                // Another report won the race; judge against what it wrote.
                None => command = self.get(command.id).await?,
            }
        }

        if command.status.is_terminal() && command.status == outcome.status() {
            tracing::debug!(command_id = %command.id, "Duplicate result ignored");
            return Ok(ResultOutcome {
                command,
                changed: false,
            });
        }
        Err(DomainError::InvalidStateTransition(format!(
            "command {} is {} and cannot become {}",
            command.id,
            command.status,
            outcome.status()
        )))
    }

    pub async fn get(&self, command_id: Uuid) -> DomainResult<Command> {
        self.ctx
            .bounded("find_command", self.ctx.store.find_command(command_id))
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("command {}", command_id)))
    }

    /// Newest-first command history of a device.
    pub async fn history(
        &self,
        device_id: Uuid,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Page<Command>> {
        self.ctx
            .bounded("find_device", self.ctx.store.find_device(device_id))
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("device {}", device_id)))?;
        let rows = self
            .ctx
            .bounded("list_commands", self.ctx.store.list_commands(device_id, page))
            .await?;
        Ok(Page::from_rows(rows, page.limit, |c| (c.created_at, c.id)))
    }
}
