//! Location sample domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// How the agent determined its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Wifi,
    Ip,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Wifi => "wifi",
            Self::Ip => "ip",
        }
    }
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LocationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gps" => Ok(Self::Gps),
            "wifi" => Ok(Self::Wifi),
            "ip" => Ok(Self::Ip),
            _ => Err(format!("Invalid location source: {}", s)),
        }
    }
}

/// Immutable location history row. One is appended per accepted check-in.
#[derive(Debug, Clone, Serialize)]
pub struct LocationSample {
    pub id: i64,
    pub device_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub source: LocationSource,
    pub ip_address: Option<String>,
    pub wifi_ssid: Option<String>,
    pub wifi_bssid: Option<String>,
    pub battery_percent: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

/// A sample about to be persisted (id assigned by the store).
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationSample {
    pub device_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub source: LocationSource,
    pub ip_address: Option<String>,
    pub wifi_ssid: Option<String>,
    pub wifi_bssid: Option<String>,
    pub battery_percent: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

/// Agent location ping.
///
/// POST /agent/ping
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PingRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[validate(range(min = 0.0, max = 100000.0, message = "Accuracy must be between 0 and 100000 meters"))]
    pub accuracy_meters: f64,

    pub source: LocationSource,

    #[validate(length(max = 64, message = "IP address must be at most 64 characters"))]
    pub ip_address: Option<String>,

    #[validate(length(max = 64, message = "SSID must be at most 64 characters"))]
    pub wifi_ssid: Option<String>,

    #[validate(length(max = 32, message = "BSSID must be at most 32 characters"))]
    pub wifi_bssid: Option<String>,

    #[validate(range(min = 0, max = 100, message = "Battery level must be between 0 and 100"))]
    pub battery_percent: Option<i32>,
}

impl PingRequest {
    /// Converts the ping into a sample for `device_id` stamped at `at`.
    pub fn into_sample(self, device_id: Uuid, at: DateTime<Utc>) -> NewLocationSample {
        NewLocationSample {
            device_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_meters: self.accuracy_meters,
            source: self.source,
            ip_address: self.ip_address,
            wifi_ssid: self.wifi_ssid,
            wifi_bssid: self.wifi_bssid,
            battery_percent: self.battery_percent,
            recorded_at: at,
        }
    }
}

/// Query parameters for GET /admin/devices/:device_id/locations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentLocationsQuery {
    pub limit: Option<i64>,
}

impl RecentLocationsQuery {
    pub const DEFAULT_LIMIT: i64 = 50;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// Response for the location history endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LocationHistoryResponse {
    pub device_id: Uuid,
    pub locations: Vec<LocationSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_source_serialization() {
        assert_eq!(serde_json::to_string(&LocationSource::Wifi).unwrap(), "\"wifi\"");
        let ip: LocationSource = serde_json::from_str("\"ip\"").unwrap();
        assert_eq!(ip, LocationSource::Ip);
    }

    #[test]
    fn test_location_source_from_str() {
        assert_eq!("GPS".parse::<LocationSource>().unwrap(), LocationSource::Gps);
        assert!("cell".parse::<LocationSource>().is_err());
    }

    #[test]
    fn test_ping_request_deserialization_minimal() {
        let json = r#"{
            "latitude": 48.1486,
            "longitude": 17.1077,
            "accuracy_meters": 25.0,
            "source": "wifi"
        }"#;
        let ping: PingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(ping.source, LocationSource::Wifi);
        assert!(ping.wifi_ssid.is_none());
        assert!(ping.battery_percent.is_none());
        assert!(ping.validate().is_ok());
    }

    #[test]
    fn test_ping_request_validation_rejects_bad_coordinates() {
        let json = r#"{
            "latitude": 95.0,
            "longitude": 17.1077,
            "accuracy_meters": -1.0,
            "source": "gps",
            "battery_percent": 140
        }"#;
        let ping: PingRequest = serde_json::from_str(json).unwrap();
        let errors = ping.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("latitude"));
        assert!(fields.contains_key("accuracy_meters"));
        assert!(fields.contains_key("battery_percent"));
        assert!(!fields.contains_key("longitude"));
    }

    #[test]
    fn test_ping_into_sample() {
        let ping = PingRequest {
            latitude: 1.0,
            longitude: 2.0,
            accuracy_meters: 3.0,
            source: LocationSource::Gps,
            ip_address: Some("203.0.113.7".into()),
            wifi_ssid: Some("corp".into()),
            wifi_bssid: None,
            battery_percent: Some(80),
        };
        let device_id = Uuid::new_v4();
        let at = Utc::now();
        let sample = ping.into_sample(device_id, at);
        assert_eq!(sample.device_id, device_id);
        assert_eq!(sample.recorded_at, at);
        assert_eq!(sample.wifi_ssid.as_deref(), Some("corp"));
        assert_eq!(sample.battery_percent, Some(80));
    }
}
