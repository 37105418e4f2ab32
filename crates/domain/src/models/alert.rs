//! Alert domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// What triggered the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    GeofenceEnter,
    GeofenceExit,
    Offline,
    CommandFailed,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeofenceEnter => "geofence_enter",
            Self::GeofenceExit => "geofence_exit",
            Self::Offline => "offline",
            Self::CommandFailed => "command_failed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::GeofenceEnter => "Entered geofence",
            Self::GeofenceExit => "Left geofence",
            Self::Offline => "Device offline",
            Self::CommandFailed => "Command failed",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::GeofenceEnter => "log-in",
            Self::GeofenceExit => "log-out",
            Self::Offline => "wifi-off",
            Self::CommandFailed => "alert-triangle",
        }
    }

    /// Severity used when no fence, policy or command supplies one.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::GeofenceEnter | Self::GeofenceExit => Severity::Medium,
            Self::Offline => Severity::Medium,
            Self::CommandFailed => Severity::Low,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geofence_enter" => Ok(Self::GeofenceEnter),
            "geofence_exit" => Ok(Self::GeofenceExit),
            "offline" => Ok(Self::Offline),
            "command_failed" => Ok(Self::CommandFailed),
            _ => Err(format!("Invalid alert type: {}", s)),
        }
    }
}

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// Triage state. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Unacknowledged,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unacknowledged => "unacknowledged",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unacknowledged" => Ok(Self::Unacknowledged),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            _ => Err(format!("Invalid alert status: {}", s)),
        }
    }
}

/// A raised alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub device_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
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

impl Alert {
    /// Key that debounce compares on.
    pub fn debounce_key(&self) -> (Uuid, AlertType, Option<Uuid>) {
        (self.device_id, self.alert_type, self.geofence_id)
    }
}

/// Alert about to be raised.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub device_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geofence_id: Option<Uuid>,
}

impl NewAlert {
    pub fn debounce_key(&self) -> (Uuid, AlertType, Option<Uuid>) {
        (self.device_id, self.alert_type, self.geofence_id)
    }

    /// Materializes the alert as `unacknowledged` at `now`.
    pub fn into_alert(self, id: Uuid, now: DateTime<Utc>) -> Alert {
        Alert {
            id,
            device_id: self.device_id,
            alert_type: self.alert_type,
            severity: self.severity,
            status: AlertStatus::Unacknowledged,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            geofence_id: self.geofence_id,
            created_at: now,
            acknowledged_at: None,
            acknowledged_notes: None,
            resolved_at: None,
            resolution_notes: None,
        }
    }
}

/// Filter for alert listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    pub device_id: Option<Uuid>,
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.device_id.map_or(true, |id| alert.device_id == id)
            && self.status.map_or(true, |s| alert.status == s)
            && self.alert_type.map_or(true, |t| alert.alert_type == t)
    }
}

/// Query parameters for GET /admin/alerts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAlertsQuery {
    pub device_id: Option<Uuid>,
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl ListAlertsQuery {
    pub fn filter(&self) -> AlertFilter {
        AlertFilter {
            device_id: self.device_id,
            status: self.status,
            alert_type: self.alert_type,
        }
    }
}

/// Body of acknowledge/resolve requests.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AlertActionRequest {
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Alert with display metadata for admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    #[serde(flatten)]
    pub alert: Alert,
    pub label: &'static str,
    pub icon: &'static str,
}

impl From<Alert> for AlertResponse {
    fn from(alert: Alert) -> Self {
        Self {
            label: alert.alert_type.label(),
            icon: alert.alert_type.icon(),
            alert,
        }
    }
}
