//! Audit log domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// Admin authenticated with an API key.
    Admin,
    /// Device agent authenticated with its token.
    Agent,
    /// Background job.
    System,
}

impl FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(ActorType::Admin),
            "agent" => Ok(ActorType::Agent),
            "system" => Ok(ActorType::System),
            _ => Err(format!("Unknown actor type: {}", s)),
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorType::Admin => write!(f, "admin"),
            ActorType::Agent => write!(f, "agent"),
            ActorType::System => write!(f, "system"),
        }
    }
}

/// Audited actions following the format: target.operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "device.register")]
    DeviceRegister,
    #[serde(rename = "device.token_rotate")]
    DeviceTokenRotate,
    #[serde(rename = "device.update")]
    DeviceUpdate,
    #[serde(rename = "device.deactivate")]
    DeviceDeactivate,
    #[serde(rename = "device.offline")]
    DeviceOffline,
    #[serde(rename = "command.enqueue")]
    CommandEnqueue,
    #[serde(rename = "command.result")]
    CommandResult,
    #[serde(rename = "geofence.create")]
    GeofenceCreate,
    #[serde(rename = "geofence.update")]
    GeofenceUpdate,
    #[serde(rename = "alert.acknowledge")]
    AlertAcknowledge,
    #[serde(rename = "alert.resolve")]
    AlertResolve,
    #[serde(rename = "policy.update")]
    PolicyUpdate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DeviceRegister => "device.register",
            AuditAction::DeviceTokenRotate => "device.token_rotate",
            AuditAction::DeviceUpdate => "device.update",
            AuditAction::DeviceDeactivate => "device.deactivate",
            AuditAction::DeviceOffline => "device.offline",
            AuditAction::CommandEnqueue => "command.enqueue",
            AuditAction::CommandResult => "command.result",
            AuditAction::GeofenceCreate => "geofence.create",
            AuditAction::GeofenceUpdate => "geofence.update",
            AuditAction::AlertAcknowledge => "alert.acknowledge",
            AuditAction::AlertResolve => "alert.resolve",
            AuditAction::PolicyUpdate => "policy.update",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device.register" => Ok(AuditAction::DeviceRegister),
            "device.token_rotate" => Ok(AuditAction::DeviceTokenRotate),
            "device.update" => Ok(AuditAction::DeviceUpdate),
            "device.deactivate" => Ok(AuditAction::DeviceDeactivate),
            "device.offline" => Ok(AuditAction::DeviceOffline),
            "command.enqueue" => Ok(AuditAction::CommandEnqueue),
            "command.result" => Ok(AuditAction::CommandResult),
            "geofence.create" => Ok(AuditAction::GeofenceCreate),
            "geofence.update" => Ok(AuditAction::GeofenceUpdate),
            "alert.acknowledge" => Ok(AuditAction::AlertAcknowledge),
            "alert.resolve" => Ok(AuditAction::AlertResolve),
            "policy.update" => Ok(AuditAction::PolicyUpdate),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub action: AuditAction,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit row about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub action: AuditAction,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn into_entry(self, id: i64) -> AuditLogEntry {
        AuditLogEntry {
            id,
            actor_type: self.actor_type,
            actor_id: self.actor_id,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            details: self.details,
            ip_address: self.ip_address,
            created_at: self.created_at,
        }
    }
}

/// Filter for audit listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub action: Option<AuditAction>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.target_type
            .as_deref()
            .map_or(true, |t| entry.target_type == t)
            && self
                .target_id
                .as_deref()
                .map_or(true, |id| entry.target_id.as_deref() == Some(id))
            && self.action.map_or(true, |a| entry.action == a)
    }
}

/// Query parameters for GET /admin/audit-logs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListAuditLogsQuery {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl ListAuditLogsQuery {
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            target_type: self.target_type.clone(),
            target_id: self.target_id.clone(),
            action: self.action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actor_type_display() {
        assert_eq!(ActorType::Admin.to_string(), "admin");
        assert_eq!("AGENT".parse::<ActorType>().unwrap(), ActorType::Agent);
        assert!("user".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_action_serializes_dotted() {
        assert_eq!(
            serde_json::to_value(AuditAction::CommandEnqueue).unwrap(),
            json!("command.enqueue")
        );
        let parsed: AuditAction = serde_json::from_str("\"device.offline\"").unwrap();
        assert_eq!(parsed, AuditAction::DeviceOffline);
        assert_eq!(
            "alert.resolve".parse::<AuditAction>().unwrap(),
            AuditAction::AlertResolve
        );
        assert!("alert.delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let entry = NewAuditEntry {
            actor_type: ActorType::System,
            actor_id: None,
            action: AuditAction::DeviceOffline,
            target_type: "device".into(),
            target_id: Some("abc".into()),
            details: None,
            ip_address: None,
            created_at: Utc::now(),
        }
        .into_entry(7);
        assert_eq!(entry.id, 7);
        assert!(AuditFilter::default().matches(&entry));
        assert!(AuditFilter {
            target_type: Some("device".into()),
            target_id: Some("abc".into()),
            action: Some(AuditAction::DeviceOffline),
        }
        .matches(&entry));
        assert!(!AuditFilter {
            target_id: Some("xyz".into()),
            ..Default::default()
        }
        .matches(&entry));
    }
}
