//! In-process store.
//!
//! All state sits behind one mutex, so every trait method is trivially
//! atomic. Used when no database URL is configured and by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{
    AlertStore, ApiKeyStore, AuditStore, CheckinCommit, CommandStore, DeviceAssignment,
    DeviceFilter, DeviceStore, GeofenceStore, LocationStore, PolicyStore, TrackingStore,
};
use crate::error::{DomainError, DomainResult};
use crate::models::command::SUPERSEDED_REASON;
use crate::models::device::LastKnownLocation;
use crate::models::{
    Alert, AlertFilter, AlertStatus, AlertType, ApiKey, AuditFilter, AuditLogEntry, Command,
    CommandCompletion, CommandStatus, CommandType, Connectivity, Device, FleetPolicy, Geofence,
    GeofenceMembership, LocationSample, ManagementState, NewApiKey, NewAuditEntry, NewCommand,
    NewDevice, PageRequest,
};

#[derive(Debug, Clone)]
struct DeviceRecord {
    device: Device,
    token_hash: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    devices: HashMap<Uuid, DeviceRecord>,
    samples: Vec<LocationSample>,
    commands: HashMap<Uuid, Command>,
    geofences: HashMap<Uuid, Geofence>,
    memberships: HashMap<(Uuid, Uuid), GeofenceMembership>,
    alerts: HashMap<Uuid, Alert>,
    audit: Vec<AuditLogEntry>,
    policies: Vec<FleetPolicy>,
    api_keys: Vec<ApiKey>,
}

impl MemoryState {
    fn device_mut(&mut self, id: Uuid) -> DomainResult<&mut Device> {
        self.devices
            .get_mut(&id)
            .map(|r| &mut r.device)
            .ok_or_else(|| DomainError::NotFound(format!("device {}", id)))
    }

    fn dequeue(&mut self, device_id: Uuid, unlock_only: bool, now: DateTime<Utc>) -> Option<Command> {
        let next_id = self
            .commands
            .values()
            .filter(|c| c.device_id == device_id && c.status == CommandStatus::Pending)
            .filter(|c| !unlock_only || c.command_type == CommandType::Unlock)
            .min_by_key(|c| (c.created_at, c.id))
            .map(|c| c.id)?;
        let command = self.commands.get_mut(&next_id)?;
        command.status = CommandStatus::Sent;
        command.sent_at = Some(now);
        Some(command.clone())
    }
}

/// Keeps rows strictly older than the cursor, newest first.
fn newest_first_page<T, K, F>(mut rows: Vec<T>, page: &PageRequest<K>, key: F) -> Vec<T>
where
    K: Ord + Copy,
    F: Fn(&T) -> (DateTime<Utc>, K),
{
    if let Some(after) = &page.after {
        rows.retain(|row| key(row) < (after.created_at, after.id));
    }
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows.truncate(usize::try_from(page.fetch_limit()).unwrap_or(0));
    rows
}

/// In-memory implementation of [`TrackingStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored location samples for a device.
    pub fn sample_count(&self, device_id: Uuid) -> usize {
        self.state()
            .samples
            .iter()
            .filter(|s| s.device_id == device_id)
            .count()
    }

    /// Overrides `last_seen_at` and connectivity, for sweep scenarios.
    pub fn set_last_seen(
        &self,
        device_id: Uuid,
        connectivity: Connectivity,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let mut state = self.state();
        let device = state.device_mut(device_id)?;
        device.connectivity = connectivity;
        device.last_seen_at = last_seen_at;
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn find_device(&self, id: Uuid) -> DomainResult<Option<Device>> {
        Ok(self.state().devices.get(&id).map(|r| r.device.clone()))
    }

    async fn find_device_by_serial(&self, serial_number: &str) -> DomainResult<Option<Device>> {
        Ok(self
            .state()
            .devices
            .values()
            .find(|r| r.device.serial_number == serial_number)
            .map(|r| r.device.clone()))
    }

    async fn find_device_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Device>> {
        Ok(self
            .state()
            .devices
            .values()
            .find(|r| r.token_hash == token_hash)
            .map(|r| r.device.clone()))
    }

    async fn create_device(&self, new: NewDevice) -> DomainResult<Device> {
        let mut state = self.state();
        if state
            .devices
            .values()
            .any(|r| r.device.serial_number == new.serial_number)
        {
            return Err(DomainError::Conflict(format!(
                "serial number {} already registered",
                new.serial_number
            )));
        }
        let device = Device {
            id: new.id,
            serial_number: new.serial_number,
            hostname: new.hostname,
            asset_tag: None,
            employee: None,
            department: None,
            connectivity: Connectivity::Offline,
            management: ManagementState::Unrestricted,
            last_location: None,
            battery_percent: None,
            last_seen_at: None,
            active: true,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        state.devices.insert(
            device.id,
            DeviceRecord {
                device: device.clone(),
                token_hash: new.agent_token_hash,
            },
        );
        Ok(device)
    }

    async fn rotate_agent_token(
        &self,
        id: Uuid,
        hostname: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Device> {
        let mut state = self.state();
        let record = state
            .devices
            .get_mut(&id)
            .ok_or_else(|| DomainError::NotFound(format!("device {}", id)))?;
        record.token_hash = token_hash.to_string();
        record.device.hostname = hostname.to_string();
        record.device.active = true;
        record.device.updated_at = now;
        Ok(record.device.clone())
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> DomainResult<Vec<Device>> {
        let mut devices: Vec<Device> = self
            .state()
            .devices
            .values()
            .filter(|r| filter.matches(&r.device))
            .map(|r| r.device.clone())
            .collect();
        devices.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        Ok(devices)
    }

    async fn update_device_assignment(
        &self,
        id: Uuid,
        assignment: &DeviceAssignment,
        now: DateTime<Utc>,
    ) -> DomainResult<Device> {
        let mut state = self.state();
        let device = state.device_mut(id)?;
        device.asset_tag = assignment.asset_tag.clone();
        device.employee = assignment.employee.clone();
        device.department = assignment.department.clone();
        device.updated_at = now;
        Ok(device.clone())
    }

    async fn deactivate_device(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Device> {
        let mut state = self.state();
        let in_flight = state
            .commands
            .values()
            .any(|c| c.device_id == id && c.status.is_in_flight());
        if in_flight {
            return Err(DomainError::Conflict(
                "device has pending or sent commands".to_string(),
            ));
        }
        let device = state.device_mut(id)?;
        device.active = false;
        device.updated_at = now;
        Ok(device.clone())
    }

    async fn stale_online_devices(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Device>> {
        Ok(self
            .state()
            .devices
            .values()
            .map(|r| &r.device)
            .filter(|d| {
                d.active
                    && d.connectivity == Connectivity::Online
                    && d.last_seen_at.map_or(false, |seen| seen < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn mark_offline_if_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut state = self.state();
        let Some(record) = state.devices.get_mut(&id) else {
            return Ok(false);
        };
        let device = &mut record.device;
        let stale = device.connectivity == Connectivity::Online
            && device.last_seen_at.map_or(false, |seen| seen < cutoff);
        if stale {
            device.connectivity = Connectivity::Offline;
            device.updated_at = now;
        }
        Ok(stale)
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn recent_samples(
        &self,
        device_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<LocationSample>> {
        let mut samples: Vec<LocationSample> = self
            .state()
            .samples
            .iter()
            .filter(|s| s.device_id == device_id)
            .cloned()
            .collect();
        samples.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));
        samples.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(samples)
    }

    async fn commit_checkin(&self, commit: CheckinCommit) -> DomainResult<Option<Command>> {
        let mut state = self.state();
        let device = state.device_mut(commit.device_id)?;
        if !device.active || device.is_wiped() {
            return Err(DomainError::InvalidStateTransition(format!(
                "device {} cannot check in",
                commit.device_id
            )));
        }

        let sample = commit.sample;
        device.connectivity = Connectivity::Online;
        device.last_seen_at = Some(commit.now);
        device.last_location = Some(LastKnownLocation {
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy_meters: sample.accuracy_meters,
            source: sample.source,
            recorded_at: sample.recorded_at,
        });
        if sample.battery_percent.is_some() {
            device.battery_percent = sample.battery_percent;
        }
        device.updated_at = commit.now;

        let id = state.samples.len() as i64 + 1;
        state.samples.push(LocationSample {
            id,
            device_id: sample.device_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy_meters: sample.accuracy_meters,
            source: sample.source,
            ip_address: sample.ip_address,
            wifi_ssid: sample.wifi_ssid,
            wifi_bssid: sample.wifi_bssid,
            battery_percent: sample.battery_percent,
            recorded_at: sample.recorded_at,
        });

        for membership in commit.memberships {
            state
                .memberships
                .insert((membership.device_id, membership.geofence_id), membership);
        }
        for alert in commit.alerts {
            state.alerts.insert(alert.id, alert);
        }

        Ok(state.dequeue(commit.device_id, commit.unlock_only, commit.now))
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn find_command(&self, id: Uuid) -> DomainResult<Option<Command>> {
        Ok(self.state().commands.get(&id).cloned())
    }

    async fn insert_command(
        &self,
        new: NewCommand,
        supersede: &[CommandType],
    ) -> DomainResult<(Command, Vec<Uuid>)> {
        let mut state = self.state();
        let mut superseded = Vec::new();
        for command in state.commands.values_mut() {
            if command.device_id == new.device_id
                && command.status.is_in_flight()
                && supersede.contains(&command.command_type)
            {
                command.status = CommandStatus::Failed;
                command.failure_reason = Some(SUPERSEDED_REASON.to_string());
                command.executed_at = Some(new.created_at);
                superseded.push(command.id);
            }
        }
        superseded.sort();

        let command = Command {
            id: new.id,
            device_id: new.device_id,
            command_type: new.command_type,
            payload: new.payload,
            status: CommandStatus::Pending,
            issued_by: new.issued_by,
            created_at: new.created_at,
            sent_at: None,
            executed_at: None,
            result_payload: None,
            failure_reason: None,
        };
        state.commands.insert(command.id, command.clone());
        Ok((command, superseded))
    }

    async fn dequeue_next_command(
        &self,
        device_id: Uuid,
        unlock_only: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Command>> {
        Ok(self.state().dequeue(device_id, unlock_only, now))
    }

    async fn complete_command(
        &self,
        id: Uuid,
        completion: &CommandCompletion,
        effect: Option<ManagementState>,
    ) -> DomainResult<Option<Command>> {
        let mut state = self.state();
        let Some(command) = state.commands.get_mut(&id) else {
            return Ok(None);
        };
        if command.status != CommandStatus::Sent {
            return Ok(None);
        }
        command.status = completion.outcome.status();
        command.executed_at = Some(completion.completed_at);
        command.result_payload = completion.result_payload.clone();
        command.failure_reason = completion.failure_reason.clone();
        let command = command.clone();

        if let Some(management) = effect {
            if let Some(record) = state.devices.get_mut(&command.device_id) {
                if !record.device.is_wiped() {
                    record.device.management = management;
                    record.device.updated_at = completion.completed_at;
                }
            }
        }
        Ok(Some(command))
    }

    async fn list_commands(
        &self,
        device_id: Uuid,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Command>> {
        let rows: Vec<Command> = self
            .state()
            .commands
            .values()
            .filter(|c| c.device_id == device_id)
            .cloned()
            .collect();
        Ok(newest_first_page(rows, page, |c| (c.created_at, c.id)))
    }
}

#[async_trait]
impl GeofenceStore for MemoryStore {
    async fn insert_geofence(&self, geofence: &Geofence) -> DomainResult<Geofence> {
        self.state()
            .geofences
            .insert(geofence.id, geofence.clone());
        Ok(geofence.clone())
    }

    async fn update_geofence(
        &self,
        geofence: &Geofence,
        reset_memberships: bool,
    ) -> DomainResult<Geofence> {
        let mut state = self.state();
        if !state.geofences.contains_key(&geofence.id) {
            return Err(DomainError::NotFound(format!("geofence {}", geofence.id)));
        }
        state.geofences.insert(geofence.id, geofence.clone());
        if reset_memberships {
            state
                .memberships
                .retain(|(_, fence_id), _| *fence_id != geofence.id);
        }
        Ok(geofence.clone())
    }

    async fn find_geofence(&self, id: Uuid) -> DomainResult<Option<Geofence>> {
        Ok(self.state().geofences.get(&id).cloned())
    }

    async fn list_geofences(&self, include_inactive: bool) -> DomainResult<Vec<Geofence>> {
        let mut fences: Vec<Geofence> = self
            .state()
            .geofences
            .values()
            .filter(|f| include_inactive || f.active)
            .cloned()
            .collect();
        fences.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(fences)
    }

    async fn list_memberships(&self, device_id: Uuid) -> DomainResult<Vec<GeofenceMembership>> {
        Ok(self
            .state()
            .memberships
            .values()
            .filter(|m| m.device_id == device_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> DomainResult<Alert> {
        self.state().alerts.insert(alert.id, alert.clone());
        Ok(alert.clone())
    }

    async fn find_alert(&self, id: Uuid) -> DomainResult<Option<Alert>> {
        Ok(self.state().alerts.get(&id).cloned())
    }

    async fn latest_alert_since(
        &self,
        device_id: Uuid,
        alert_type: AlertType,
        geofence_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        Ok(self
            .state()
            .alerts
            .values()
            .filter(|a| a.debounce_key() == (device_id, alert_type, geofence_id))
            .filter(|a| a.created_at >= since)
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn transition_alert(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        to: AlertStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        let mut state = self.state();
        let Some(alert) = state.alerts.get_mut(&id) else {
            return Ok(None);
        };
        if !from.contains(&alert.status) {
            return Ok(None);
        }
        alert.status = to;
        match to {
            AlertStatus::Acknowledged => {
                alert.acknowledged_at = Some(at);
                alert.acknowledged_notes = notes.map(str::to_string);
            }
            AlertStatus::Resolved => {
                alert.resolved_at = Some(at);
                alert.resolution_notes = notes.map(str::to_string);
            }
            AlertStatus::Unacknowledged => {}
        }
        Ok(Some(alert.clone()))
    }

    async fn list_alerts(
        &self,
        filter: &AlertFilter,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Alert>> {
        let rows: Vec<Alert> = self
            .state()
            .alerts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        Ok(newest_first_page(rows, page, |a| (a.created_at, a.id)))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditLogEntry> {
        let mut state = self.state();
        let entry = entry.into_entry(state.audit.len() as i64 + 1);
        state.audit.push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        page: &PageRequest<i64>,
    ) -> DomainResult<Vec<AuditLogEntry>> {
        let rows: Vec<AuditLogEntry> = self
            .state()
            .audit
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(newest_first_page(rows, page, |e| (e.created_at, e.id)))
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn current_policy(&self) -> DomainResult<Option<FleetPolicy>> {
        Ok(self.state().policies.last().cloned())
    }

    async fn seed_policy(&self, initial: &FleetPolicy) -> DomainResult<FleetPolicy> {
        let mut state = self.state();
        if let Some(current) = state.policies.last() {
            return Ok(current.clone());
        }
        state.policies.push(initial.clone());
        Ok(initial.clone())
    }

    async fn append_policy_version(
        &self,
        next: &FleetPolicy,
        expected_version: i32,
    ) -> DomainResult<FleetPolicy> {
        let mut state = self.state();
        let current = state.policies.last().map(|p| p.version).unwrap_or(0);
        if current != expected_version {
            return Err(DomainError::Conflict(format!(
                "policy version is {}, expected {}",
                current, expected_version
            )));
        }
        state.policies.push(next.clone());
        Ok(next.clone())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> DomainResult<Option<ApiKey>> {
        Ok(self
            .state()
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn touch_api_key(&self, id: i64, at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(key) = self.state().api_keys.iter_mut().find(|k| k.id == id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn ensure_api_key(&self, key: NewApiKey) -> DomainResult<ApiKey> {
        let mut state = self.state();
        if let Some(existing) = state.api_keys.iter().find(|k| k.key_hash == key.key_hash) {
            return Ok(existing.clone());
        }
        let stored = ApiKey {
            id: state.api_keys.len() as i64 + 1,
            key_hash: key.key_hash,
            key_prefix: key.key_prefix,
            name: key.name,
            is_active: true,
            expires_at: key.expires_at,
            last_used_at: None,
            created_at: Utc::now(),
        };
        state.api_keys.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandOutcome, LocationSource, NewLocationSample};
    use chrono::Duration;

    async fn seeded_device(store: &MemoryStore) -> Device {
        store
            .create_device(NewDevice {
                id: Uuid::new_v4(),
                serial_number: format!("SN-{}", Uuid::new_v4().simple()),
                hostname: "host".into(),
                agent_token_hash: format!("hash-{}", Uuid::new_v4()),
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    fn new_command(device_id: Uuid, command_type: CommandType, at: DateTime<Utc>) -> NewCommand {
        NewCommand {
            id: Uuid::new_v4(),
            device_id,
            command_type,
            payload: None,
            issued_by: "ft_test".into(),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_device_rejects_duplicate_serial() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        let err = store
            .create_device(NewDevice {
                id: Uuid::new_v4(),
                serial_number: device.serial_number.clone(),
                hostname: "other".into(),
                agent_token_hash: "x".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dequeue_orders_by_created_at_then_id() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        let t0 = Utc::now();
        let (later, _) = store
            .insert_command(new_command(device.id, CommandType::Restart, t0 + Duration::seconds(1)), &[])
            .await
            .unwrap();
        let (first, _) = store
            .insert_command(new_command(device.id, CommandType::Message, t0), &[])
            .await
            .unwrap();

        let a = store.dequeue_next_command(device.id, false, t0).await.unwrap().unwrap();
        let b = store.dequeue_next_command(device.id, false, t0).await.unwrap().unwrap();
        assert_eq!(a.id, first.id);
        assert_eq!(b.id, later.id);
        assert_eq!(a.status, CommandStatus::Sent);
        assert!(store.dequeue_next_command(device.id, false, t0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dequeue_unlock_only() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        let now = Utc::now();
        store
            .insert_command(new_command(device.id, CommandType::Restart, now), &[])
            .await
            .unwrap();
        assert!(store.dequeue_next_command(device.id, true, now).await.unwrap().is_none());
        let (unlock, _) = store
            .insert_command(new_command(device.id, CommandType::Unlock, now + Duration::seconds(1)), &[])
            .await
            .unwrap();
        let got = store.dequeue_next_command(device.id, true, now).await.unwrap().unwrap();
        assert_eq!(got.id, unlock.id);
    }

    #[tokio::test]
    async fn test_complete_command_requires_sent_and_applies_effect() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        let now = Utc::now();
        let (cmd, _) = store
            .insert_command(new_command(device.id, CommandType::Lock, now), &[])
            .await
            .unwrap();
        let completion = CommandCompletion {
            outcome: CommandOutcome::Executed,
            result_payload: None,
            failure_reason: None,
            completed_at: now,
        };
        assert!(store
            .complete_command(cmd.id, &completion, Some(ManagementState::Locked))
            .await
            .unwrap()
            .is_none());

        store.dequeue_next_command(device.id, false, now).await.unwrap();
        let done = store
            .complete_command(cmd.id, &completion, Some(ManagementState::Locked))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, CommandStatus::Executed);
        let device = store.find_device(device.id).await.unwrap().unwrap();
        assert!(device.is_locked());
    }

    #[tokio::test]
    async fn test_deactivate_blocked_by_in_flight_commands() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        store
            .insert_command(new_command(device.id, CommandType::Restart, Utc::now()), &[])
            .await
            .unwrap();
        let err = store.deactivate_device(device.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_commit_checkin_rejects_wiped_device() {
        let store = MemoryStore::new();
        let device = seeded_device(&store).await;
        store.state().device_mut(device.id).unwrap().management = ManagementState::Wiped;
        let now = Utc::now();
        let err = store
            .commit_checkin(CheckinCommit {
                device_id: device.id,
                sample: NewLocationSample {
                    device_id: device.id,
                    latitude: 0.0,
                    longitude: 0.0,
                    accuracy_meters: 10.0,
                    source: LocationSource::Gps,
                    ip_address: None,
                    wifi_ssid: None,
                    wifi_bssid: None,
                    battery_percent: None,
                    recorded_at: now,
                },
                memberships: vec![],
                alerts: vec![],
                unlock_only: false,
                now,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        assert_eq!(store.sample_count(device.id), 0);
    }

    #[tokio::test]
    async fn test_policy_versioning() {
        let store = MemoryStore::new();
        let v1 = FleetPolicy::initial(Default::default(), Utc::now());
        store.seed_policy(&v1).await.unwrap();
        let mut v2 = v1.clone();
        v2.version = 2;
        store.append_policy_version(&v2, 1).await.unwrap();
        let err = store.append_policy_version(&v2, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(store.current_policy().await.unwrap().unwrap().version, 2);
        // Seeding again keeps the current version.
        assert_eq!(store.seed_policy(&v1).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_audit_pagination_newest_first() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            store
                .append_audit(NewAuditEntry {
                    actor_type: crate::models::ActorType::System,
                    actor_id: None,
                    action: crate::models::AuditAction::DeviceOffline,
                    target_type: "device".into(),
                    target_id: None,
                    details: None,
                    ip_address: None,
                    created_at: base + Duration::seconds(i),
                })
                .await
                .unwrap();
        }
        let first = store
            .list_audit(&AuditFilter::default(), &PageRequest::first(2))
            .await
            .unwrap();
        assert_eq!(first.iter().map(|e| e.id).collect::<Vec<_>>(), vec![5, 4, 3]);

        let after = PageRequest {
            limit: 2,
            after: Some(crate::models::PageCursor {
                created_at: first[1].created_at,
                id: first[1].id,
            }),
        };
        let second = store.list_audit(&AuditFilter::default(), &after).await.unwrap();
        assert_eq!(second.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2, 1]);
    }
}
