//! Repository implementations.
//!
//! Repositories own SQL. Methods that take `&mut PgConnection` run inside a
//! transaction opened by the caller.

pub mod alert;
pub mod api_key;
pub mod audit_log;
pub mod command;
pub mod device;
pub mod fleet_policy;
pub mod geofence;
pub mod location;

pub use alert::AlertRepository;
pub use api_key::ApiKeyRepository;
pub use audit_log::AuditLogRepository;
pub use command::CommandRepository;
pub use device::{Deactivation, DeviceLifecycleRow, DeviceRepository};
pub use fleet_policy::FleetPolicyRepository;
pub use geofence::GeofenceRepository;
pub use location::LocationRepository;
