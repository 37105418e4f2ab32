//! Fleet policy entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::FleetPolicy;
use serde_json::Value as JsonValue;
use sqlx::FromRow;

use crate::error::{decode_json, PersistenceError};

/// Database row mapping for the fleet_policies table. Each row is one
/// immutable version.
#[derive(Debug, Clone, FromRow)]
pub struct FleetPolicyEntity {
    pub version: i32,
    pub settings: JsonValue,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FleetPolicyEntity> for FleetPolicy {
    type Error = PersistenceError;

    fn try_from(entity: FleetPolicyEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            version: entity.version,
            settings: decode_json("settings", entity.settings)?,
            updated_by: entity.updated_by,
            updated_at: entity.updated_at,
        })
    }
}
