//! Storage ports for the tracking core.
//!
//! Services talk to storage only through these traits. `persistence::PgStore`
//! implements them on PostgreSQL; [`memory::MemoryStore`] keeps everything in
//! process for development and tests.
//!
//! Methods that change more than one row are atomic: either every write lands
//! or none does.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainResult;
use crate::models::{
    Alert, AlertFilter, AlertStatus, AlertType, ApiKey, AuditFilter, AuditLogEntry, Command,
    CommandCompletion, CommandType, Device, FleetPolicy, Geofence, GeofenceMembership,
    LocationSample, ManagementState, NewApiKey, NewAuditEntry, NewCommand, NewDevice,
    NewLocationSample, PageRequest,
};

/// Filter for device listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFilter {
    pub department: Option<String>,
    pub include_inactive: bool,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        (self.include_inactive || device.active)
            && self
                .department
                .as_deref()
                .map_or(true, |d| device.department.as_deref() == Some(d))
    }
}

/// Full assignment metadata written by an admin update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAssignment {
    pub asset_tag: Option<String>,
    pub employee: Option<String>,
    pub department: Option<String>,
}

/// Everything one accepted check-in writes.
#[derive(Debug, Clone)]
pub struct CheckinCommit {
    pub device_id: Uuid,
    pub sample: NewLocationSample,
    /// Memberships that are new or changed.
    pub memberships: Vec<GeofenceMembership>,
    /// Alerts that passed debounce.
    pub alerts: Vec<Alert>,
    /// Only an `unlock` command may be dequeued.
    pub unlock_only: bool,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_device(&self, id: Uuid) -> DomainResult<Option<Device>>;

    async fn find_device_by_serial(&self, serial_number: &str) -> DomainResult<Option<Device>>;

    async fn find_device_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Device>>;

    /// Fails with `Conflict` when the serial number is taken.
    async fn create_device(&self, device: NewDevice) -> DomainResult<Device>;

    /// Replaces the agent token, refreshes the hostname and reactivates.
    async fn rotate_agent_token(
        &self,
        id: Uuid,
        hostname: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Device>;

    async fn list_devices(&self, filter: &DeviceFilter) -> DomainResult<Vec<Device>>;

    async fn update_device_assignment(
        &self,
        id: Uuid,
        assignment: &DeviceAssignment,
        now: DateTime<Utc>,
    ) -> DomainResult<Device>;

    /// Soft delete. Fails with `Conflict` while the device has pending or
    /// sent commands.
    async fn deactivate_device(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Device>;

    /// Active, online devices last seen before `cutoff`, wiped ones included.
    async fn stale_online_devices(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Device>>;

    /// Sets connectivity to offline only if the device is still online and
    /// `last_seen_at < cutoff` at write time. Returns whether a row changed.
    async fn mark_offline_if_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Most recent samples first.
    async fn recent_samples(&self, device_id: Uuid, limit: i64)
        -> DomainResult<Vec<LocationSample>>;

    /// Atomically applies a check-in and dequeues at most one command.
    ///
    /// Fails with `InvalidStateTransition` (writing nothing) if the device
    /// was wiped or deactivated after the caller read it.
    async fn commit_checkin(&self, commit: CheckinCommit) -> DomainResult<Option<Command>>;
}

#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn find_command(&self, id: Uuid) -> DomainResult<Option<Command>>;

    /// Marks in-flight commands of the `supersede` types on the same device
    /// as failed ("superseded") and inserts `command` as pending, atomically.
    /// Returns the new command and the ids it superseded.
    async fn insert_command(
        &self,
        command: NewCommand,
        supersede: &[CommandType],
    ) -> DomainResult<(Command, Vec<Uuid>)>;

    /// Takes the oldest pending command (created_at, then id), marks it sent.
    async fn dequeue_next_command(
        &self,
        device_id: Uuid,
        unlock_only: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Command>>;

    /// Moves a `sent` command to its terminal state and, in the same
    /// transaction, sets the device management state to `effect` unless the
    /// device is wiped. Returns `None` if the command was not in `sent`.
    async fn complete_command(
        &self,
        id: Uuid,
        completion: &CommandCompletion,
        effect: Option<ManagementState>,
    ) -> DomainResult<Option<Command>>;

    /// Newest first. Returns up to `page.fetch_limit()` rows.
    async fn list_commands(
        &self,
        device_id: Uuid,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Command>>;
}

#[async_trait]
pub trait GeofenceStore: Send + Sync {
    async fn insert_geofence(&self, geofence: &Geofence) -> DomainResult<Geofence>;

    /// Overwrites the stored fence. When `reset_memberships` is set, stored
    /// memberships for the fence are dropped so the next check-in re-baselines.
    async fn update_geofence(
        &self,
        geofence: &Geofence,
        reset_memberships: bool,
    ) -> DomainResult<Geofence>;

    async fn find_geofence(&self, id: Uuid) -> DomainResult<Option<Geofence>>;

    async fn list_geofences(&self, include_inactive: bool) -> DomainResult<Vec<Geofence>>;

    async fn list_memberships(&self, device_id: Uuid) -> DomainResult<Vec<GeofenceMembership>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, alert: &Alert) -> DomainResult<Alert>;

    async fn find_alert(&self, id: Uuid) -> DomainResult<Option<Alert>>;

    /// Newest alert with the given debounce key created at or after `since`.
    async fn latest_alert_since(
        &self,
        device_id: Uuid,
        alert_type: AlertType,
        geofence_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>>;

    /// Conditional status change: applies only when the current status is
    /// one of `from`. Returns `None` when it did not apply.
    async fn transition_alert(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        to: AlertStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>>;

    /// Newest first. Returns up to `page.fetch_limit()` rows.
    async fn list_alerts(
        &self,
        filter: &AlertFilter,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Alert>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditLogEntry>;

    /// Newest first. Returns up to `page.fetch_limit()` rows.
    async fn list_audit(
        &self,
        filter: &AuditFilter,
        page: &PageRequest<i64>,
    ) -> DomainResult<Vec<AuditLogEntry>>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn current_policy(&self) -> DomainResult<Option<FleetPolicy>>;

    /// Inserts `initial` only if no version exists; returns the current one.
    async fn seed_policy(&self, initial: &FleetPolicy) -> DomainResult<FleetPolicy>;

    /// Appends `next` if the current version still equals `expected_version`,
    /// otherwise fails with `Conflict`.
    async fn append_policy_version(
        &self,
        next: &FleetPolicy,
        expected_version: i32,
    ) -> DomainResult<FleetPolicy>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> DomainResult<Option<ApiKey>>;

    async fn touch_api_key(&self, id: i64, at: DateTime<Utc>) -> DomainResult<()>;

    /// Inserts the key unless one with the same hash exists.
    async fn ensure_api_key(&self, key: NewApiKey) -> DomainResult<ApiKey>;
}

/// The full storage surface used by the services.
#[async_trait]
pub trait TrackingStore:
    DeviceStore
    + LocationStore
    + CommandStore
    + GeofenceStore
    + AlertStore
    + AuditStore
    + PolicyStore
    + ApiKeyStore
{
    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> DomainResult<()>;
}
