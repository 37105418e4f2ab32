//! Database entity definitions.
//!
//! Entities are direct mappings to database rows. Enum columns are TEXT and
//! decode through the domain `FromStr` impls.

pub mod alert;
pub mod api_key;
pub mod audit_log;
pub mod command;
pub mod device;
pub mod fleet_policy;
pub mod geofence;
pub mod location;

pub use alert::{AlertEntity, ALERT_COLUMNS};
pub use api_key::ApiKeyEntity;
pub use audit_log::{AuditLogEntity, AUDIT_COLUMNS};
pub use command::{CommandEntity, COMMAND_COLUMNS};
pub use device::{DeviceEntity, DEVICE_COLUMNS};
pub use fleet_policy::FleetPolicyEntity;
pub use geofence::{GeofenceEntity, GeofenceMembershipEntity, GEOFENCE_COLUMNS};
pub use location::LocationSampleEntity;
