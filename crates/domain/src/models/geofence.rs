//! Geofence domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::alert::Severity;
use crate::error::{DomainError, DomainResult};

/// Largest accepted circle radius.
pub const MAX_RADIUS_METERS: f64 = 500_000.0;

/// Largest accepted polygon vertex count.
pub const MAX_POLYGON_VERTICES: usize = 1_000;

/// Zone geometry. Polygon vertices are `[lat, lon]` pairs; the closing edge
/// is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeofenceShape {
    Circle {
        center_lat: f64,
        center_lon: f64,
        radius_meters: f64,
    },
    Polygon {
        vertices: Vec<[f64; 2]>,
    },
}

impl GeofenceShape {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Circle { .. } => "circle",
            Self::Polygon { .. } => "polygon",
        }
    }

    /// Rejects geometry that cannot describe a zone.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Self::Circle {
                center_lat,
                center_lon,
                radius_meters,
            } => {
                shared::validation::validate_coordinates(*center_lat, *center_lon)?;
                if !(*radius_meters > 0.0 && *radius_meters <= MAX_RADIUS_METERS) {
                    return Err(DomainError::Validation(format!(
                        "radius_meters: Radius must be greater than 0 and at most {} meters",
                        MAX_RADIUS_METERS
                    )));
                }
                Ok(())
            }
            Self::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(DomainError::Validation(
                        "vertices: Polygon needs at least 3 vertices".to_string(),
                    ));
                }
                if vertices.len() > MAX_POLYGON_VERTICES {
                    return Err(DomainError::Validation(format!(
                        "vertices: Polygon must have at most {} vertices",
                        MAX_POLYGON_VERTICES
                    )));
                }
                for [lat, lon] in vertices {
                    shared::validation::validate_coordinates(*lat, *lon)?;
                }
                Ok(())
            }
        }
    }
}

/// An admin-defined zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub shape: GeofenceShape,
    pub active: bool,
    /// `None` applies the fence to every device.
    pub department: Option<String>,
    pub alert_on_enter: bool,
    pub alert_on_exit: bool,
    pub alert_severity: Severity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// Whether this fence is evaluated for a device in `department`.
    pub fn applies_to(&self, department: Option<&str>) -> bool {
        match &self.department {
            None => true,
            Some(scope) => department == Some(scope.as_str()),
        }
    }
}

/// Last known inside/outside state of a device for one fence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceMembership {
    pub device_id: Uuid,
    pub geofence_id: Uuid,
    pub inside: bool,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_severity() -> Severity {
    Severity::Medium
}

/// Request payload for creating a geofence.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub shape: GeofenceShape,

    #[serde(default = "default_true")]
    pub active: bool,

    #[validate(length(min = 1, max = 128, message = "Department must be 1-128 characters"))]
    pub department: Option<String>,

    #[serde(default = "default_true")]
    pub alert_on_enter: bool,

    #[serde(default = "default_true")]
    pub alert_on_exit: bool,

    #[serde(default = "default_severity")]
    pub alert_severity: Severity,
}

/// Request payload for updating a geofence (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateGeofenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub shape: Option<GeofenceShape>,

    pub active: Option<bool>,

    /// Empty string clears the scope.
    #[validate(length(max = 128, message = "Department must be at most 128 characters"))]
    pub department: Option<String>,

    pub alert_on_enter: Option<bool>,

    pub alert_on_exit: Option<bool>,

    pub alert_severity: Option<Severity>,
}

impl UpdateGeofenceRequest {
    /// Applies the changes onto `fence`, stamping `now`.
    pub fn apply(self, fence: &mut Geofence, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            fence.name = name;
        }
        if let Some(shape) = self.shape {
            fence.shape = shape;
        }
        if let Some(active) = self.active {
            fence.active = active;
        }
        if let Some(department) = self.department {
            fence.department = if department.is_empty() {
                None
            } else {
                Some(department)
            };
        }
        if let Some(v) = self.alert_on_enter {
            fence.alert_on_enter = v;
        }
        if let Some(v) = self.alert_on_exit {
            fence.alert_on_exit = v;
        }
        if let Some(severity) = self.alert_severity {
            fence.alert_severity = severity;
        }
        fence.updated_at = now;
    }
}

/// Query parameters for listing geofences.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListGeofencesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
pub struct ListGeofencesResponse {
    pub geofences: Vec<Geofence>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle() -> GeofenceShape {
        GeofenceShape::Circle {
            center_lat: 0.0,
            center_lon: 0.0,
            radius_meters: 100.0,
        }
    }

    fn fence(department: Option<&str>) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: "HQ".to_string(),
            shape: circle(),
            active: true,
            department: department.map(str::to_string),
            alert_on_enter: true,
            alert_on_exit: true,
            alert_severity: Severity::Medium,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_shape_serialization() {
        let json = serde_json::to_value(circle()).unwrap();
        assert_eq!(json["type"], "circle");
        assert_eq!(json["radius_meters"], 100.0);

        let polygon: GeofenceShape = serde_json::from_str(
            r#"{"type": "polygon", "vertices": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]}"#,
        )
        .unwrap();
        assert_eq!(polygon.kind(), "polygon");
    }

    #[test]
    fn test_shape_validation() {
        assert!(circle().validate().is_ok());
        let zero = GeofenceShape::Circle {
            center_lat: 0.0,
            center_lon: 0.0,
            radius_meters: 0.0,
        };
        assert!(zero.validate().is_err());
        let bad_center = GeofenceShape::Circle {
            center_lat: 91.0,
            center_lon: 0.0,
            radius_meters: 10.0,
        };
        assert!(bad_center.validate().is_err());
        let line = GeofenceShape::Polygon {
            vertices: vec![[0.0, 0.0], [1.0, 1.0]],
        };
        assert!(line.validate().is_err());
        let triangle = GeofenceShape::Polygon {
            vertices: vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
        };
        assert!(triangle.validate().is_ok());
    }

    #[test]
    fn test_applies_to_department_scope() {
        assert!(fence(None).applies_to(None));
        assert!(fence(None).applies_to(Some("Sales")));
        assert!(fence(Some("Sales")).applies_to(Some("Sales")));
        assert!(!fence(Some("Sales")).applies_to(Some("Finance")));
        assert!(!fence(Some("Sales")).applies_to(None));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateGeofenceRequest = serde_json::from_str(
            r#"{"name": "HQ", "shape": {"type": "circle", "center_lat": 1.0, "center_lon": 2.0, "radius_meters": 50.0}}"#,
        )
        .unwrap();
        assert!(req.active);
        assert!(req.alert_on_enter);
        assert!(req.alert_on_exit);
        assert_eq!(req.alert_severity, Severity::Medium);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_apply() {
        let mut f = fence(Some("Sales"));
        let later = f.updated_at + chrono::Duration::seconds(5);
        UpdateGeofenceRequest {
            name: Some("Warehouse".into()),
            department: Some(String::new()),
            alert_severity: Some(Severity::Critical),
            ..Default::default()
        }
        .apply(&mut f, later);
        assert_eq!(f.name, "Warehouse");
        assert!(f.department.is_none());
        assert_eq!(f.alert_severity, Severity::Critical);
        assert_eq!(f.updated_at, later);
        assert!(f.alert_on_exit);
    }
}
