//! Geofence evaluation.
//!
//! Pure functions: classify a coordinate against a zone and decide whether a
//! membership change is an alertable transition. Boundaries are inclusive for
//! both circles and polygons.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::models::{AlertType, Geofence, GeofenceShape};

/// Tolerance, in degrees, for treating a point as lying on a polygon edge.
const EDGE_EPSILON: f64 = 1e-12;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// Result of evaluating one point against one fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub inside: bool,
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Enter,
    Exit,
}

impl TransitionKind {
    pub fn alert_type(&self) -> AlertType {
        match self {
            Self::Enter => AlertType::GeofenceEnter,
            Self::Exit => AlertType::GeofenceExit,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Enter => "entered",
            Self::Exit => "left",
        }
    }
}

/// Great-circle distance in meters (mean Earth radius 6 371 008.8 m).
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Classifies `point` against a shape.
pub fn contains(shape: &GeofenceShape, point: Coordinate) -> bool {
    match shape {
        GeofenceShape::Circle {
            center_lat,
            center_lon,
            radius_meters,
        } => haversine_meters(point, Coordinate::new(*center_lat, *center_lon)) <= *radius_meters,
        GeofenceShape::Polygon { vertices } => polygon_contains(vertices, point),
    }
}

/// Classifies `point` against a fence's geometry.
pub fn evaluate(point: Coordinate, fence: &Geofence) -> Evaluation {
    Evaluation {
        inside: contains(&fence.shape, point),
    }
}

/// Returns a transition only when membership flipped and the fence asks to
/// be alerted for that direction.
pub fn evaluate_transition(
    previous_inside: bool,
    current_inside: bool,
    alert_on_enter: bool,
    alert_on_exit: bool,
) -> Option<TransitionKind> {
    match (previous_inside, current_inside) {
        (false, true) if alert_on_enter => Some(TransitionKind::Enter),
        (true, false) if alert_on_exit => Some(TransitionKind::Exit),
        _ => None,
    }
}

/// Crossing-number test on `[lat, lon]` vertices with the closing edge
/// implied. Points on an edge or vertex count as inside.
fn polygon_contains(vertices: &[[f64; 2]], point: Coordinate) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let (px, py) = (point.longitude, point.latitude);
    let n = vertices.len();

    for i in 0..n {
        let [ay, ax] = vertices[i];
        let [by, bx] = vertices[(i + 1) % n];
        if on_segment(px, py, ax, ay, bx, by) {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [yi, xi] = vertices[i];
        let [yj, xj] = vertices[j];
        // Half-open rule: an edge counts when exactly one endpoint is above.
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    px >= ax.min(bx) - EDGE_EPSILON
        && px <= ax.max(bx) + EDGE_EPSILON
        && py >= ay.min(by) - EDGE_EPSILON
        && py <= ay.max(by) + EDGE_EPSILON
}
