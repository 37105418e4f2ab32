//! PostgreSQL implementation of the domain storage ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::{DomainError, DomainResult};
use domain::models::{
    Alert, AlertFilter, AlertStatus, AlertType, ApiKey, AuditFilter, AuditLogEntry, Command,
    CommandCompletion, CommandType, Device, FleetPolicy, Geofence, GeofenceMembership,
    LocationSample, ManagementState, NewApiKey, NewAuditEntry, NewCommand, NewDevice,
    PageRequest,
};
use domain::store::{
    AlertStore, ApiKeyStore, AuditStore, CheckinCommit, CommandStore, DeviceAssignment,
    DeviceFilter, DeviceStore, GeofenceStore, LocationStore, PolicyStore, TrackingStore,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::CommandEntity;
use crate::error::{encode_json, PersistenceError};
use crate::metrics::QueryTimer;
use crate::repositories::{
    AlertRepository, ApiKeyRepository, AuditLogRepository, CommandRepository, Deactivation,
    DeviceRepository, FleetPolicyRepository, GeofenceRepository, LocationRepository,
};

/// Converts rows and lifts any error into a [`DomainError`].
fn convert<E, T>(rows: Vec<E>) -> DomainResult<Vec<T>>
where
    T: TryFrom<E, Error = PersistenceError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(DomainError::from))
        .collect()
}

fn convert_opt<E, T>(row: Option<E>) -> DomainResult<Option<T>>
where
    T: TryFrom<E, Error = PersistenceError>,
{
    row.map(T::try_from).transpose().map_err(DomainError::from)
}

fn db(err: sqlx::Error) -> DomainError {
    PersistenceError::Database(err).into()
}

fn device_not_found(id: Uuid) -> DomainError {
    DomainError::NotFound(format!("device {}", id))
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    devices: DeviceRepository,
    locations: LocationRepository,
    commands: CommandRepository,
    geofences: GeofenceRepository,
    alerts: AlertRepository,
    audit: AuditLogRepository,
    policies: FleetPolicyRepository,
    api_keys: ApiKeyRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            devices: DeviceRepository::new(pool.clone()),
            locations: LocationRepository::new(pool.clone()),
            commands: CommandRepository::new(pool.clone()),
            geofences: GeofenceRepository::new(pool.clone()),
            alerts: AlertRepository::new(pool.clone()),
            audit: AuditLogRepository::new(pool.clone()),
            policies: FleetPolicyRepository::new(pool.clone()),
            api_keys: ApiKeyRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs a check-in in one transaction. `None` means the device no
    /// longer accepts check-ins and nothing was written.
    async fn checkin_tx(
        &self,
        commit: &CheckinCommit,
    ) -> Result<Option<Option<CommandEntity>>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(lifecycle) = DeviceRepository::lock_lifecycle(&mut *tx, commit.device_id).await? else {
            return Ok(None);
        };
        if !lifecycle.accepts_checkin() {
            return Ok(None);
        }

        DeviceRepository::record_checkin(&mut *tx, &commit.sample, commit.now).await?;
        LocationRepository::insert(&mut *tx, &commit.sample).await?;
        for membership in &commit.memberships {
            GeofenceRepository::upsert_membership(&mut *tx, membership).await?;
        }
        for alert in &commit.alerts {
            AlertRepository::insert(&mut *tx, alert).await?;
        }
        let command =
            CommandRepository::dequeue_next(&mut *tx, commit.device_id, commit.unlock_only, commit.now)
                .await?;
        tx.commit().await?;
        Ok(Some(command))
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn find_device(&self, id: Uuid) -> DomainResult<Option<Device>> {
        convert_opt(self.devices.find_by_id(id).await.map_err(db)?)
    }

    async fn find_device_by_serial(&self, serial_number: &str) -> DomainResult<Option<Device>> {
        convert_opt(self.devices.find_by_serial(serial_number).await.map_err(db)?)
    }

    async fn find_device_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Device>> {
        convert_opt(self.devices.find_by_token_hash(token_hash).await.map_err(db)?)
    }

    async fn create_device(&self, device: NewDevice) -> DomainResult<Device> {
        let row = self.devices.create(&device).await.map_err(db)?;
        Ok(Device::try_from(row)?)
    }

    async fn rotate_agent_token(
        &self,
        id: Uuid,
        hostname: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Device> {
        let row = self
            .devices
            .rotate_token(id, hostname, token_hash, now)
            .await
            .map_err(db)?
            .ok_or_else(|| device_not_found(id))?;
        Ok(Device::try_from(row)?)
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> DomainResult<Vec<Device>> {
        convert(
            self.devices
                .list(filter.department.as_deref(), filter.include_inactive)
                .await
                .map_err(db)?,
        )
    }

    async fn update_device_assignment(
        &self,
        id: Uuid,
        assignment: &DeviceAssignment,
        now: DateTime<Utc>,
    ) -> DomainResult<Device> {
        let row = self
            .devices
            .update_assignment(id, assignment, now)
            .await
            .map_err(db)?
            .ok_or_else(|| device_not_found(id))?;
        Ok(Device::try_from(row)?)
    }

    async fn deactivate_device(&self, id: Uuid, now: DateTime<Utc>) -> DomainResult<Device> {
        match self.devices.deactivate(id, now).await.map_err(db)? {
            Deactivation::Missing => Err(device_not_found(id)),
            Deactivation::CommandsInFlight => Err(DomainError::Conflict(
                "device has pending or sent commands".to_string(),
            )),
            Deactivation::Done(row) => Ok(Device::try_from(row)?),
        }
    }

    async fn stale_online_devices(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Device>> {
        convert(self.devices.stale_online(cutoff).await.map_err(db)?)
    }

    async fn mark_offline_if_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        self.devices
            .mark_offline_if_stale(id, cutoff, now)
            .await
            .map_err(db)
    }
}

#[async_trait]
impl LocationStore for PgStore {
    async fn recent_samples(
        &self,
        device_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<LocationSample>> {
        convert(self.locations.recent(device_id, limit).await.map_err(db)?)
    }

    async fn commit_checkin(&self, commit: CheckinCommit) -> DomainResult<Option<Command>> {
        let timer = QueryTimer::new("commit_checkin");
        let outcome = timer.finish(self.checkin_tx(&commit).await).map_err(db)?;
        match outcome {
            Some(command) => convert_opt(command),
            None => Err(DomainError::InvalidStateTransition(format!(
                "device {} cannot check in",
                commit.device_id
            ))),
        }
    }
}

#[async_trait]
impl CommandStore for PgStore {
    async fn find_command(&self, id: Uuid) -> DomainResult<Option<Command>> {
        convert_opt(self.commands.find_by_id(id).await.map_err(db)?)
    }

    async fn insert_command(
        &self,
        command: NewCommand,
        supersede: &[CommandType],
    ) -> DomainResult<(Command, Vec<Uuid>)> {
        let timer = QueryTimer::new("insert_command");
        let result: Result<_, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            DeviceRepository::lock_lifecycle(&mut *tx, command.device_id).await?;
            let superseded =
                CommandRepository::supersede(&mut *tx, command.device_id, supersede, command.created_at)
                    .await?;
            let row = CommandRepository::insert(&mut *tx, &command).await?;
            tx.commit().await?;
            Ok((row, superseded))
        }
        .await;
        let (row, superseded) = timer.finish(result).map_err(db)?;
        Ok((Command::try_from(row)?, superseded))
    }

    async fn dequeue_next_command(
        &self,
        device_id: Uuid,
        unlock_only: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Command>> {
        convert_opt(
            self.commands
                .dequeue_next_pooled(device_id, unlock_only, now)
                .await
                .map_err(db)?,
        )
    }

    async fn complete_command(
        &self,
        id: Uuid,
        completion: &CommandCompletion,
        effect: Option<ManagementState>,
    ) -> DomainResult<Option<Command>> {
        let timer = QueryTimer::new("complete_command");
        let result: Result<_, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let Some(row) = CommandRepository::complete(&mut *tx, id, completion).await? else {
                return Ok(None);
            };
            if let Some(state) = effect {
                DeviceRepository::apply_management(&mut *tx, row.device_id, state, completion.completed_at)
                    .await?;
            }
            tx.commit().await?;
            Ok(Some(row))
        }
        .await;
        convert_opt(timer.finish(result).map_err(db)?)
    }

    async fn list_commands(
        &self,
        device_id: Uuid,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Command>> {
        convert(
            self.commands
                .list_for_device(device_id, page.after.as_ref(), page.fetch_limit())
                .await
                .map_err(db)?,
        )
    }
}

#[async_trait]
impl GeofenceStore for PgStore {
    async fn insert_geofence(&self, geofence: &Geofence) -> DomainResult<Geofence> {
        let shape = encode_json("shape", &geofence.shape)?;
        let row = self.geofences.insert(geofence, shape).await.map_err(db)?;
        Ok(Geofence::try_from(row)?)
    }

    async fn update_geofence(
        &self,
        geofence: &Geofence,
        reset_memberships: bool,
    ) -> DomainResult<Geofence> {
        let shape = encode_json("shape", &geofence.shape)?;
        let row = self
            .geofences
            .update(geofence, shape, reset_memberships)
            .await
            .map_err(db)?
            .ok_or_else(|| DomainError::NotFound(format!("geofence {}", geofence.id)))?;
        Ok(Geofence::try_from(row)?)
    }

    async fn find_geofence(&self, id: Uuid) -> DomainResult<Option<Geofence>> {
        convert_opt(self.geofences.find_by_id(id).await.map_err(db)?)
    }

    async fn list_geofences(&self, include_inactive: bool) -> DomainResult<Vec<Geofence>> {
        convert(self.geofences.list(include_inactive).await.map_err(db)?)
    }

    async fn list_memberships(&self, device_id: Uuid) -> DomainResult<Vec<GeofenceMembership>> {
        Ok(self
            .geofences
            .memberships(device_id)
            .await
            .map_err(db)?
            .into_iter()
            .map(GeofenceMembership::from)
            .collect())
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(&self, alert: &Alert) -> DomainResult<Alert> {
        let row = self.alerts.insert_pooled(alert).await.map_err(db)?;
        Ok(Alert::try_from(row)?)
    }

    async fn find_alert(&self, id: Uuid) -> DomainResult<Option<Alert>> {
        convert_opt(self.alerts.find_by_id(id).await.map_err(db)?)
    }

    async fn latest_alert_since(
        &self,
        device_id: Uuid,
        alert_type: AlertType,
        geofence_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        convert_opt(
            self.alerts
                .latest_since(device_id, alert_type, geofence_id, since)
                .await
                .map_err(db)?,
        )
    }

    async fn transition_alert(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        to: AlertStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Alert>> {
        convert_opt(
            self.alerts
                .transition(id, from, to, notes, at)
                .await
                .map_err(db)?,
        )
    }

    async fn list_alerts(
        &self,
        filter: &AlertFilter,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Vec<Alert>> {
        convert(
            self.alerts
                .list(filter, page.after.as_ref(), page.fetch_limit())
                .await
                .map_err(db)?,
        )
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditLogEntry> {
        let row = self.audit.insert(&entry).await.map_err(db)?;
        Ok(AuditLogEntry::try_from(row)?)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        page: &PageRequest<i64>,
    ) -> DomainResult<Vec<AuditLogEntry>> {
        convert(
            self.audit
                .list(filter, page.after.as_ref(), page.fetch_limit())
                .await
                .map_err(db)?,
        )
    }
}

#[async_trait]
impl PolicyStore for PgStore {
    async fn current_policy(&self) -> DomainResult<Option<FleetPolicy>> {
        convert_opt(self.policies.current().await.map_err(db)?)
    }

    async fn seed_policy(&self, initial: &FleetPolicy) -> DomainResult<FleetPolicy> {
        if let Some(current) = self.current_policy().await? {
            return Ok(current);
        }
        let settings = encode_json("settings", &initial.settings)?;
        self.policies
            .insert_version(
                initial.version,
                settings,
                initial.updated_by.as_deref(),
                initial.updated_at,
            )
            .await
            .map_err(db)?;
        // A concurrent seed may have won; either way the latest row is current.
        self.current_policy()
            .await?
            .ok_or_else(|| DomainError::Storage("fleet policy missing after seed".to_string()))
    }

    async fn append_policy_version(
        &self,
        next: &FleetPolicy,
        expected_version: i32,
    ) -> DomainResult<FleetPolicy> {
        let current = self.current_policy().await?.map(|p| p.version).unwrap_or(0);
        if current != expected_version {
            return Err(DomainError::Conflict(format!(
                "policy version is {}, expected {}",
                current, expected_version
            )));
        }
        let settings = encode_json("settings", &next.settings)?;
        let row = self
            .policies
            .insert_version(next.version, settings, next.updated_by.as_deref(), next.updated_at)
            .await
            .map_err(db)?
            .ok_or_else(|| {
                DomainError::Conflict(format!(
                    "policy version {} was written concurrently",
                    next.version
                ))
            })?;
        Ok(FleetPolicy::try_from(row)?)
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> DomainResult<Option<ApiKey>> {
        Ok(self
            .api_keys
            .find_by_key_hash(key_hash)
            .await
            .map_err(db)?
            .map(ApiKey::from))
    }

    async fn touch_api_key(&self, id: i64, at: DateTime<Utc>) -> DomainResult<()> {
        self.api_keys.update_last_used(id, at).await.map_err(db)
    }

    async fn ensure_api_key(&self, key: NewApiKey) -> DomainResult<ApiKey> {
        Ok(self.api_keys.ensure(&key).await.map_err(db)?.into())
    }
}

#[async_trait]
impl TrackingStore for PgStore {
    async fn ping(&self) -> DomainResult<()> {
        let timer = QueryTimer::new("ping");
        let result = sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ());
        timer.finish(result).map_err(db)
    }
}
