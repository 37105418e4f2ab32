//! Audit log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::AuditLogEntry;
use serde_json::Value as JsonValue;
use sqlx::FromRow;

use crate::error::{parse_column, PersistenceError};

pub const AUDIT_COLUMNS: &str =
    "id, actor_type, actor_id, action, target_type, target_id, details, ip_address, created_at";

/// Database row mapping for the audit_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntity {
    pub id: i64,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogEntity> for AuditLogEntry {
    type Error = PersistenceError;

    fn try_from(entity: AuditLogEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            actor_type: parse_column("actor_type", &entity.actor_type)?,
            action: parse_column("action", &entity.action)?,
            id: entity.id,
            actor_id: entity.actor_id,
            target_type: entity.target_type,
            target_id: entity.target_id,
            details: entity.details,
            ip_address: entity.ip_address,
            created_at: entity.created_at,
        })
    }
}
