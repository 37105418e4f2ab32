//! Agent check-in: records the location, evaluates geofences and hands back
//! at most one queued command.

use std::collections::HashMap;

use uuid::Uuid;
use validator::Validate;

use super::alerts::AlertService;
use super::context::ServiceContext;
use super::geofence_evaluator::{evaluate, evaluate_transition, Coordinate};
use super::policy::PolicyService;
use crate::error::{DomainError, DomainResult};
use crate::models::location::PingRequest;
use crate::models::{Alert, CheckinResponse, Command, Device, GeofenceMembership, NewAlert};
use crate::store::{CheckinCommit, DeviceStore, GeofenceStore, LocationStore};

/// Everything a check-in produced.
#[derive(Debug, Clone)]
pub struct CheckinOutcome {
    pub response: CheckinResponse,
    pub command: Option<Command>,
    /// Geofence alerts that passed debounce.
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone)]
pub struct CheckinService {
    ctx: ServiceContext,
    policy: PolicyService,
    alerts: AlertService,
}

impl CheckinService {
    pub fn new(ctx: ServiceContext, policy: PolicyService, alerts: AlertService) -> Self {
        Self {
            ctx,
            policy,
            alerts,
        }
    }

    pub async fn checkin(&self, device_id: Uuid, ping: PingRequest) -> DomainResult<CheckinOutcome> {
        let _guard = self.ctx.lock_device(device_id).await?;

        let device = self
            .ctx
            .bounded("find_device", self.ctx.store.find_device(device_id))
            .await?
            .filter(|d| d.active)
            .ok_or_else(|| DomainError::NotFound(format!("device {}", device_id)))?;
        if device.is_wiped() {
            tracing::warn!(device_id = %device_id, "Check-in from wiped device rejected");
            return Err(DomainError::InvalidStateTransition(format!(
                "device {} has been wiped",
                device_id
            )));
        }

        ping.validate()?;
        shared::validation::validate_coordinates(ping.latitude, ping.longitude)?;

        let now = self.ctx.now();
        let point = Coordinate::new(ping.latitude, ping.longitude);
        let (memberships, alerts) = self.evaluate_fences(&device, point, now).await?;

        let commit = CheckinCommit {
            device_id,
            sample: ping.into_sample(device_id, now),
            memberships,
            alerts: alerts.clone(),
            unlock_only: device.is_locked(),
            now,
        };
        let command = self
            .ctx
            .bounded("commit_checkin", self.ctx.store.commit_checkin(commit))
            .await?;

        for alert in &alerts {
            tracing::info!(
                alert_id = %alert.id,
                device_id = %device_id,
                alert_type = %alert.alert_type,
                geofence_id = ?alert.geofence_id,
                "Geofence alert raised"
            );
        }
        tracing::debug!(
            device_id = %device_id,
            command_id = ?command.as_ref().map(|c| c.id),
            "Check-in accepted"
        );

        Ok(CheckinOutcome {
            response: CheckinResponse::ok(command.as_ref()),
            command,
            alerts,
        })
    }

    /// Membership rows to write and the debounced alerts to insert.
    async fn evaluate_fences(
        &self,
        device: &Device,
        point: Coordinate,
        now: chrono::DateTime<chrono::Utc>,
    ) -> DomainResult<(Vec<GeofenceMembership>, Vec<Alert>)> {
        let fences = self
            .ctx
            .bounded("list_geofences", self.ctx.store.list_geofences(false))
            .await?;
        let previous: HashMap<Uuid, bool> = self
            .ctx
            .bounded("list_memberships", self.ctx.store.list_memberships(device.id))
            .await?
            .into_iter()
            .map(|m| (m.geofence_id, m.inside))
            .collect();
        let window = self.policy.current().await?.alert_debounce();

        let mut memberships = Vec::new();
        let mut alerts = Vec::new();
        for fence in fences
            .iter()
            .filter(|f| f.active && f.applies_to(device.department.as_deref()))
        {
            let inside = evaluate(point, fence).inside;
            // Without a stored membership the last reported location decides.
            let was_inside = previous.get(&fence.id).copied().or_else(|| {
                device
                    .last_location
                    .as_ref()
                    .map(|last| evaluate(Coordinate::new(last.latitude, last.longitude), fence).inside)
            });
            if was_inside == Some(inside) {
                continue;
            }
            memberships.push(GeofenceMembership {
                device_id: device.id,
                geofence_id: fence.id,
                inside,
                updated_at: now,
            });

            // Device has never reported: this sample is the baseline.
            let Some(was_inside) = was_inside else {
                continue;
            };
            let Some(kind) =
                evaluate_transition(was_inside, inside, fence.alert_on_enter, fence.alert_on_exit)
            else {
                continue;
            };
            let candidate = NewAlert {
                device_id: device.id,
                alert_type: kind.alert_type(),
                severity: fence.alert_severity,
                description: format!("{} {} geofence '{}'", device.hostname, kind.verb(), fence.name),
                latitude: Some(point.latitude),
                longitude: Some(point.longitude),
                geofence_id: Some(fence.id),
            };
            if self
                .alerts
                .find_debouncing(&candidate, now, window)
                .await?
                .is_some()
            {
                tracing::debug!(
                    device_id = %device.id,
                    geofence_id = %fence.id,
                    "Geofence alert suppressed by debounce"
                );
                continue;
            }
            alerts.push(candidate.into_alert(Uuid::new_v4(), now));
        }
        Ok((memberships, alerts))
    }
}
