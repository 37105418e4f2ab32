//! Domain models for Fleet Tracker.

pub mod alert;
pub mod api_key;
pub mod audit_log;
pub mod command;
pub mod device;
pub mod fleet_policy;
pub mod geofence;
pub mod location;
pub mod page;

pub use alert::{Alert, AlertFilter, AlertStatus, AlertType, NewAlert, Severity};
pub use api_key::{ApiKey, NewApiKey};
pub use audit_log::{ActorType, AuditAction, AuditFilter, AuditLogEntry, NewAuditEntry};
pub use command::{
    CheckinResponse, Command, CommandCompletion, CommandDescriptor, CommandOutcome, CommandStatus,
    CommandType, NewCommand,
};
pub use device::{Connectivity, Device, DeviceStatus, ManagementState, NewDevice};
pub use fleet_policy::{FleetPolicy, PolicySettings};
pub use geofence::{Geofence, GeofenceMembership, GeofenceShape};
pub use location::{LocationSample, LocationSource, NewLocationSample};
pub use page::{Page, PageCursor, PageInfo, PageRequest};
