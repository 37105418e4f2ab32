//! Command entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Command;
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{parse_column, PersistenceError};

pub const COMMAND_COLUMNS: &str = "id, device_id, command_type, payload, status, issued_by, \
     created_at, sent_at, executed_at, result_payload, failure_reason";

/// Database row mapping for the commands table.
#[derive(Debug, Clone, FromRow)]
pub struct CommandEntity {
    pub id: Uuid,
    pub device_id: Uuid,
    pub command_type: String,
    pub payload: Option<JsonValue>,
    pub status: String,
    pub issued_by: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub result_payload: Option<JsonValue>,
    pub failure_reason: Option<String>,
}

impl TryFrom<CommandEntity> for Command {
    type Error = PersistenceError;

    fn try_from(entity: CommandEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            command_type: parse_column("command_type", &entity.command_type)?,
            status: parse_column("status", &entity.status)?,
            id: entity.id,
            device_id: entity.device_id,
            payload: entity.payload,
            issued_by: entity.issued_by,
            created_at: entity.created_at,
            sent_at: entity.sent_at,
            executed_at: entity.executed_at,
            result_payload: entity.result_payload,
            failure_reason: entity.failure_reason,
        })
    }
}
