//! Device entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::device::LastKnownLocation;
use domain::models::Device;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{parse_column, PersistenceError};

/// Column list matching [`DeviceEntity`].
pub const DEVICE_COLUMNS: &str = "id, serial_number, hostname, asset_tag, employee, department, \
     connectivity, management, last_latitude, last_longitude, last_accuracy_meters, \
     last_location_source, last_location_at, battery_percent, last_seen_at, active, \
     created_at, updated_at";

/// Database row mapping for the devices table. The agent token hash is
/// never selected.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEntity {
    pub id: Uuid,
    pub serial_number: String,
    pub hostname: String,
    pub asset_tag: Option<String>,
    pub employee: Option<String>,
    pub department: Option<String>,
    pub connectivity: String,
    pub management: String,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_accuracy_meters: Option<f64>,
    pub last_location_source: Option<String>,
    pub last_location_at: Option<DateTime<Utc>>,
    pub battery_percent: Option<i32>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceEntity {
    fn last_location(&self) -> Result<Option<LastKnownLocation>, PersistenceError> {
        let (Some(latitude), Some(longitude), Some(source), Some(recorded_at)) = (
            self.last_latitude,
            self.last_longitude,
            self.last_location_source.as_deref(),
            self.last_location_at,
        ) else {
            return Ok(None);
        };
        Ok(Some(LastKnownLocation {
            latitude,
            longitude,
            accuracy_meters: self.last_accuracy_meters.unwrap_or_default(),
            source: parse_column("last_location_source", source)?,
            recorded_at,
        }))
    }
}

impl TryFrom<DeviceEntity> for Device {
    type Error = PersistenceError;

    fn try_from(entity: DeviceEntity) -> Result<Self, Self::Error> {
        let last_location = entity.last_location()?;
        Ok(Self {
            connectivity: parse_column("connectivity", &entity.connectivity)?,
            management: parse_column("management", &entity.management)?,
            id: entity.id,
            serial_number: entity.serial_number,
            hostname: entity.hostname,
            asset_tag: entity.asset_tag,
            employee: entity.employee,
            department: entity.department,
            last_location,
            battery_percent: entity.battery_percent,
            last_seen_at: entity.last_seen_at,
            active: entity.active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{Connectivity, LocationSource, ManagementState};

    fn entity() -> DeviceEntity {
        DeviceEntity {
            id: Uuid::new_v4(),
            serial_number: "SN-1".into(),
            hostname: "laptop".into(),
            asset_tag: None,
            employee: Some("Ada".into()),
            department: Some("Ops".into()),
            connectivity: "online".into(),
            management: "locked".into(),
            last_latitude: Some(48.1),
            last_longitude: Some(17.1),
            last_accuracy_meters: Some(12.0),
            last_location_source: Some("wifi".into()),
            last_location_at: Some(Utc::now()),
            battery_percent: Some(40),
            last_seen_at: Some(Utc::now()),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_device_conversion() {
        let device = Device::try_from(entity()).unwrap();
        assert_eq!(device.connectivity, Connectivity::Online);
        assert_eq!(device.management, ManagementState::Locked);
        let location = device.last_location.unwrap();
        assert_eq!(location.source, LocationSource::Wifi);
        assert_eq!(location.accuracy_meters, 12.0);
    }

    #[test]
    fn test_partial_location_is_none() {
        let mut row = entity();
        row.last_location_source = None;
        assert!(Device::try_from(row).unwrap().last_location.is_none());
    }

    #[test]
    fn test_unknown_management_state_is_corrupt() {
        let mut row = entity();
        row.management = "bricked".into();
        assert!(matches!(
            Device::try_from(row),
            Err(PersistenceError::Corrupt { column: "management", .. })
        ));
    }
}
