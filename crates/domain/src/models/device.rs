//! Device domain model.
//!
//! Device state is tracked on two orthogonal axes: connectivity (driven by
//! check-ins and the offline sweep) and management (driven by executed
//! lock/unlock/wipe commands).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::location::LocationSource;

/// Whether the agent has checked in recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Connectivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid connectivity: {}", s)),
        }
    }
}

/// Remote-management restriction applied to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementState {
    Unrestricted,
    Locked,
    /// Terminal: a wiped device never returns to another state.
    Wiped,
}

impl ManagementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Locked => "locked",
            Self::Wiped => "wiped",
        }
    }
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ManagementState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unrestricted" => Ok(Self::Unrestricted),
            "locked" => Ok(Self::Locked),
            "wiped" => Ok(Self::Wiped),
            _ => Err(format!("Invalid management state: {}", s)),
        }
    }
}

/// Single status value shown to admins, derived from both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Locked,
    Wiped,
}

/// Last reported position of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastKnownLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub source: LocationSource,
    pub recorded_at: DateTime<Utc>,
}

/// Represents a registered device in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub serial_number: String,
    pub hostname: String,
    pub asset_tag: Option<String>,
    pub employee: Option<String>,
    pub department: Option<String>,
    pub connectivity: Connectivity,
    pub management: ManagementState,
    pub last_location: Option<LastKnownLocation>,
    pub battery_percent: Option<i32>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Derived display status. Management restrictions win over connectivity.
    pub fn status(&self) -> DeviceStatus {
        match (self.management, self.connectivity) {
            (ManagementState::Wiped, _) => DeviceStatus::Wiped,
            (ManagementState::Locked, _) => DeviceStatus::Locked,
            (ManagementState::Unrestricted, Connectivity::Online) => DeviceStatus::Online,
            (ManagementState::Unrestricted, Connectivity::Offline) => DeviceStatus::Offline,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.management == ManagementState::Locked
    }

    pub fn is_wiped(&self) -> bool {
        self.management == ManagementState::Wiped
    }
}

/// Data required to create a device row at registration.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub id: Uuid,
    pub serial_number: String,
    pub hostname: String,
    pub agent_token_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Request payload for agent registration.
///
/// POST /agent/register
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterAgentRequest {
    #[validate(custom(function = "shared::validation::validate_serial_number"))]
    pub serial_number: String,

    #[validate(length(min = 1, max = 255, message = "Hostname must be 1-255 characters"))]
    pub hostname: String,

    pub registration_code: Option<String>,
}

/// Response payload for agent registration. The token is shown only once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    pub device_id: Uuid,
    pub agent_token: String,
}

/// Admin update of assignment metadata.
///
/// PATCH /admin/devices/:device_id
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateDeviceRequest {
    #[validate(length(max = 64, message = "Asset tag must be at most 64 characters"))]
    pub asset_tag: Option<String>,

    #[validate(length(max = 255, message = "Employee must be at most 255 characters"))]
    pub employee: Option<String>,

    #[validate(length(max = 128, message = "Department must be at most 128 characters"))]
    pub department: Option<String>,
}

/// Device as returned by admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceResponse {
    pub id: Uuid,
    pub serial_number: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub status: DeviceStatus,
    pub connectivity: Connectivity,
    pub is_locked: bool,
    pub is_wiped: bool,
    pub last_location: Option<LastKnownLocation>,
    pub battery_percent: Option<i32>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            status: device.status(),
            is_locked: device.is_locked(),
            is_wiped: device.is_wiped(),
            id: device.id,
            serial_number: device.serial_number,
            hostname: device.hostname,
            asset_tag: device.asset_tag,
            employee: device.employee,
            department: device.department,
            connectivity: device.connectivity,
            last_location: device.last_location,
            battery_percent: device.battery_percent,
            last_seen_at: device.last_seen_at,
            active: device.active,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

/// Query parameters for the admin device list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDevicesQuery {
    pub department: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Response for GET /admin/devices.
#[derive(Debug, Clone, Serialize)]
pub struct ListDevicesResponse {
    pub devices: Vec<DeviceResponse>,
    pub total: usize,
}

impl From<Vec<Device>> for ListDevicesResponse {
    fn from(devices: Vec<Device>) -> Self {
        let devices: Vec<DeviceResponse> = devices.into_iter().map(DeviceResponse::from).collect();
        Self {
            total: devices.len(),
            devices,
        }
    }
}
