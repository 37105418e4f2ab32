//! Alert entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::Alert;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{parse_column, PersistenceError};

pub const ALERT_COLUMNS: &str = "id, device_id, alert_type, severity, status, description, \
     latitude, longitude, geofence_id, created_at, acknowledged_at, acknowledged_notes, \
     resolved_at, resolution_notes";

/// Database row mapping for the alerts table.
#[derive(Debug, Clone, FromRow)]
pub struct AlertEntity {
    pub id: Uuid,
    pub device_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geofence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

impl TryFrom<AlertEntity> for Alert {
    type Error = PersistenceError;

    fn try_from(entity: AlertEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            alert_type: parse_column("alert_type", &entity.alert_type)?,
            severity: parse_column("severity", &entity.severity)?,
            status: parse_column("status", &entity.status)?,
            id: entity.id,
            device_id: entity.device_id,
            description: entity.description,
            latitude: entity.latitude,
            longitude: entity.longitude,
            geofence_id: entity.geofence_id,
            created_at: entity.created_at,
            acknowledged_at: entity.acknowledged_at,
            acknowledged_notes: entity.acknowledged_notes,
            resolved_at: entity.resolved_at,
            resolution_notes: entity.resolution_notes,
        })
    }
}
