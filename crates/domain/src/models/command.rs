//! Remote command domain models.
//!
//! Commands are queued by admins and pulled by agents on check-in. Status
//! moves along `pending -> sent -> executed | failed` exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use super::alert::Severity;
use crate::error::{DomainError, DomainResult};

/// Maximum length of a `message` command text.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Failure reason stamped on commands displaced by a newer conflicting one.
pub const SUPERSEDED_REASON: &str = "superseded";

/// Kinds of remote command an agent can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Lock,
    Unlock,
    Wipe,
    Restart,
    Shutdown,
    Message,
    Screenshot,
}

impl CommandType {
    pub const ALL: [CommandType; 7] = [
        Self::Lock,
        Self::Unlock,
        Self::Wipe,
        Self::Restart,
        Self::Shutdown,
        Self::Message,
        Self::Screenshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Wipe => "wipe",
            Self::Restart => "restart",
            Self::Shutdown => "shutdown",
            Self::Message => "message",
            Self::Screenshot => "screenshot",
        }
    }

    /// Human readable label for admin surfaces.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lock => "Lock device",
            Self::Unlock => "Unlock device",
            Self::Wipe => "Wipe device",
            Self::Restart => "Restart device",
            Self::Shutdown => "Shut down device",
            Self::Message => "Show message",
            Self::Screenshot => "Capture screenshot",
        }
    }

    /// Icon key for admin surfaces.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "lock-open",
            Self::Wipe => "trash",
            Self::Restart => "rotate-cw",
            Self::Shutdown => "power",
            Self::Message => "message-square",
            Self::Screenshot => "camera",
        }
    }

    /// Lock, unlock and wipe change the management state of the device.
    pub fn is_lock_class(&self) -> bool {
        matches!(self, Self::Lock | Self::Unlock | Self::Wipe)
    }

    /// Whether enqueuing `self` displaces an in-flight command of type `other`.
    pub fn supersedes(&self, other: CommandType) -> bool {
        match self {
            Self::Wipe => other.is_lock_class(),
            Self::Lock | Self::Unlock => matches!(other, Self::Lock | Self::Unlock),
            Self::Restart | Self::Shutdown | Self::Message | Self::Screenshot => false,
        }
    }

    /// Severity of the alert raised when a command of this type fails.
    pub fn failure_severity(&self) -> Severity {
        match self {
            Self::Lock | Self::Wipe => Severity::High,
            Self::Unlock | Self::Restart | Self::Shutdown | Self::Message | Self::Screenshot => {
                Severity::Low
            }
        }
    }

    /// Checks the admin-supplied payload for this command type.
    pub fn validate_payload(&self, payload: Option<&JsonValue>) -> DomainResult<()> {
        match self {
            Self::Message => {
                let text = payload
                    .and_then(|p| p.get("text"))
                    .and_then(JsonValue::as_str)
                    .map(str::trim)
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(DomainError::Validation(
                        "payload.text: Message text is required".to_string(),
                    ));
                }
                if text.chars().count() > MAX_MESSAGE_LENGTH {
                    return Err(DomainError::Validation(format!(
                        "payload.text: Message text must be at most {} characters",
                        MAX_MESSAGE_LENGTH
                    )));
                }
                Ok(())
            }
            _ => match payload {
                None | Some(JsonValue::Null) | Some(JsonValue::Object(_)) => Ok(()),
                Some(_) => Err(DomainError::Validation(
                    "payload: Payload must be a JSON object".to_string(),
                )),
            },
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            "wipe" => Ok(Self::Wipe),
            "restart" => Ok(Self::Restart),
            "shutdown" => Ok(Self::Shutdown),
            "message" => Ok(Self::Message),
            "screenshot" => Ok(Self::Screenshot),
            _ => Err(format!("Invalid command type: {}", s)),
        }
    }
}

/// Lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Sent,
    Executed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Executed => "executed",
            Self::Failed => "failed",
        }
    }

    /// Pending or sent.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Sent)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "executed" => Ok(Self::Executed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid command status: {}", s)),
        }
    }
}

/// Outcome reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Executed,
    Failed,
}

impl CommandOutcome {
    pub fn status(&self) -> CommandStatus {
        match self {
            Self::Executed => CommandStatus::Executed,
            Self::Failed => CommandStatus::Failed,
        }
    }
}

/// A queued remote command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub device_id: Uuid,
    pub command_type: CommandType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
    pub status: CommandStatus,
    pub issued_by: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// A command about to be inserted in `pending` state.
#[derive(Debug, Clone)]
pub struct NewCommand {
    pub id: Uuid,
    pub device_id: Uuid,
    pub command_type: CommandType,
    pub payload: Option<JsonValue>,
    pub issued_by: String,
    pub created_at: DateTime<Utc>,
}

/// Terminal transition requested for a sent command.
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    pub outcome: CommandOutcome,
    pub result_payload: Option<JsonValue>,
    pub failure_reason: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// What the agent receives on check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

impl From<&Command> for CommandDescriptor {
    fn from(command: &Command) -> Self {
        Self {
            id: command.id,
            command_type: command.command_type,
            issued_at: command.created_at,
            payload: command.payload.clone(),
        }
    }
}

/// Response to POST /agent/ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub status: String,
    pub command: Option<CommandDescriptor>,
}

impl CheckinResponse {
    pub fn ok(command: Option<&Command>) -> Self {
        Self {
            status: "ok".to_string(),
            command: command.map(CommandDescriptor::from),
        }
    }
}

/// Body of POST /commands/:type/:device_id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnqueueCommandRequest {
    #[serde(default)]
    pub payload: Option<JsonValue>,
}

/// Response for a queued command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueCommandResponse {
    pub command_id: Uuid,
    pub status: CommandStatus,
    pub superseded: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Body of POST /agent/commands/:command_id/result.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommandResultRequest {
    pub outcome: CommandOutcome,

    #[serde(default)]
    pub result: Option<JsonValue>,

    #[validate(length(max = 2000, message = "Error must be at most 2000 characters"))]
    pub error: Option<String>,
}

/// Response to a result report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResultResponse {
    pub command_id: Uuid,
    pub status: CommandStatus,
    pub changed: bool,
}

/// Query parameters for GET /commands/history/:device_id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandHistoryQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// Command as returned by admin endpoints, with display metadata.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    #[serde(flatten)]
    pub command: Command,
    pub label: &'static str,
    pub icon: &'static str,
}

impl From<Command> for CommandResponse {
    fn from(command: Command) -> Self {
        Self {
            label: command.command_type.label(),
            icon: command.command_type.icon(),
            command,
        }
    }
}
