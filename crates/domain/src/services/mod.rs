//! Domain services for Fleet Tracker.
//!
//! Services own the business rules. They reach storage only through
//! [`crate::store::TrackingStore`] and share one [`ServiceContext`].

pub mod alerts;
pub mod audit;
pub mod checkin;
pub mod command_queue;
pub mod command_result;
pub mod context;
pub mod device_locks;
pub mod device_state;
pub mod geofence_evaluator;
pub mod geofences;
pub mod offline_sweep;
pub mod policy;
pub mod registration;

#[cfg(test)]
pub(crate) mod testing;

pub use alerts::{AlertService, RaiseOutcome};
pub use audit::{Actor, AuditLogBuilder, AuditService};
pub use checkin::{CheckinOutcome, CheckinService};
pub use command_queue::{CommandQueue, EnqueueOutcome, ResultOutcome};
pub use command_result::CommandResultService;
pub use context::{Clock, ManualClock, ServiceContext, SystemClock};
pub use device_locks::DeviceLocks;
pub use device_state::DeviceService;
pub use geofences::GeofenceService;
pub use offline_sweep::{OfflineSweep, SweepReport};
pub use policy::PolicyService;
pub use registration::{AdminPrincipal, RegistrationService, RegistrationSettings};

/// Every service, wired to one context.
#[derive(Debug, Clone)]
pub struct FleetServices {
    pub ctx: ServiceContext,
    pub audit: AuditService,
    pub policy: PolicyService,
    pub alerts: AlertService,
    pub commands: CommandQueue,
    pub checkin: CheckinService,
    pub results: CommandResultService,
    pub devices: DeviceService,
    pub geofences: GeofenceService,
    pub registration: RegistrationService,
    pub sweep: OfflineSweep,
}

impl FleetServices {
    pub fn new(ctx: ServiceContext, registration: RegistrationSettings) -> Self {
        let audit = AuditService::new(ctx.clone());
        let policy = PolicyService::new(ctx.clone(), audit.clone());
        let alerts = AlertService::new(ctx.clone(), policy.clone(), audit.clone());
        let commands = CommandQueue::new(ctx.clone(), policy.clone(), audit.clone());
        Self {
            checkin: CheckinService::new(ctx.clone(), policy.clone(), alerts.clone()),
            results: CommandResultService::new(
                ctx.clone(),
                commands.clone(),
                alerts.clone(),
                audit.clone(),
            ),
            devices: DeviceService::new(ctx.clone(), audit.clone()),
            geofences: GeofenceService::new(ctx.clone(), audit.clone()),
            registration: RegistrationService::new(ctx.clone(), audit.clone(), registration),
            sweep: OfflineSweep::new(ctx.clone(), policy.clone(), alerts.clone(), audit.clone()),
            ctx,
            audit,
            policy,
            alerts,
            commands,
        }
    }
}
