//! Location sample entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::LocationSample;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{parse_column, PersistenceError};

/// Database row mapping for the location_samples table.
#[derive(Debug, Clone, FromRow)]
pub struct LocationSampleEntity {
    pub id: i64,
    pub device_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub source: String,
    pub ip_address: Option<String>,
    pub wifi_ssid: Option<String>,
    pub wifi_bssid: Option<String>,
    pub battery_percent: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<LocationSampleEntity> for LocationSample {
    type Error = PersistenceError;

    fn try_from(entity: LocationSampleEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            source: parse_column("source", &entity.source)?,
            id: entity.id,
            device_id: entity.device_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            accuracy_meters: entity.accuracy_meters,
            ip_address: entity.ip_address,
            wifi_ssid: entity.wifi_ssid,
            wifi_bssid: entity.wifi_bssid,
            battery_percent: entity.battery_percent,
            recorded_at: entity.recorded_at,
        })
    }
}
