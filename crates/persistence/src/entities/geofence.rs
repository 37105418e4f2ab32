//! Geofence and membership entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Geofence, GeofenceMembership};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{decode_json, parse_column, PersistenceError};

pub const GEOFENCE_COLUMNS: &str = "id, name, shape, active, department, alert_on_enter, \
     alert_on_exit, alert_severity, created_at, updated_at";

/// Database row mapping for the geofences table. `shape` is the tagged
/// JSON form of [`domain::models::GeofenceShape`].
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceEntity {
    pub id: Uuid,
    pub name: String,
    pub shape: JsonValue,
    pub active: bool,
    pub department: Option<String>,
    pub alert_on_enter: bool,
    pub alert_on_exit: bool,
    pub alert_severity: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GeofenceEntity> for Geofence {
    type Error = PersistenceError;

    fn try_from(entity: GeofenceEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            shape: decode_json("shape", entity.shape)?,
            alert_severity: parse_column("alert_severity", &entity.alert_severity)?,
            id: entity.id,
            name: entity.name,
            active: entity.active,
            department: entity.department,
            alert_on_enter: entity.alert_on_enter,
            alert_on_exit: entity.alert_on_exit,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Database row mapping for the geofence_memberships table.
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceMembershipEntity {
    pub device_id: Uuid,
    pub geofence_id: Uuid,
    pub inside: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<GeofenceMembershipEntity> for GeofenceMembership {
    fn from(entity: GeofenceMembershipEntity) -> Self {
        Self {
            device_id: entity.device_id,
            geofence_id: entity.geofence_id,
            inside: entity.inside,
            updated_at: entity.updated_at,
        }
    }
}
