//! Marks silent devices offline and raises `offline` alerts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::alerts::{AlertService, RaiseOutcome};
use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use super::policy::PolicyService;
use crate::error::DomainResult;
use crate::models::{AlertType, AuditAction, Device, NewAlert};
use crate::store::DeviceStore;

/// Summary of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Devices that looked stale when the pass started.
    pub candidates: usize,
    pub marked_offline: usize,
    pub alerts_raised: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct OfflineSweep {
    ctx: ServiceContext,
    policy: PolicyService,
    alerts: AlertService,
    audit: AuditService,
}

impl OfflineSweep {
    pub fn new(
        ctx: ServiceContext,
        policy: PolicyService,
        alerts: AlertService,
        audit: AuditService,
    ) -> Self {
        Self {
            ctx,
            policy,
            alerts,
            audit,
        }
    }

    /// One pass at the current clock time.
    pub async fn run(&self) -> DomainResult<SweepReport> {
        self.run_once(self.ctx.now()).await
    }

    /// One pass treating `now` as the current time. Per-device failures are
    /// logged and counted; they do not stop the pass.
    pub async fn run_once(&self, now: DateTime<Utc>) -> DomainResult<SweepReport> {
        let policy = self.policy.current().await?;
        let cutoff = now - policy.offline_threshold();
        let stale = self
            .ctx
            .bounded("stale_online_devices", self.ctx.store.stale_online_devices(cutoff))
            .await?;

        let mut report = SweepReport {
            candidates: stale.len(),
            ..Default::default()
        };
        for device in &stale {
            match self.sweep_device(device, cutoff, now, policy.settings.offline_alert_severity).await {
                Ok((marked, raised)) => {
                    report.marked_offline += usize::from(marked);
                    report.alerts_raised += usize::from(raised);
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(device_id = %device.id, error = %e, "Offline sweep failed for device");
                }
            }
        }
        self.ctx.locks.prune();

        if report.marked_offline > 0 || report.errors > 0 {
            tracing::info!(
                candidates = report.candidates,
                marked_offline = report.marked_offline,
                alerts_raised = report.alerts_raised,
                errors = report.errors,
                "Offline sweep finished"
            );
        }
        Ok(report)
    }

    async fn sweep_device(
        &self,
        device: &Device,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        severity: crate::models::Severity,
    ) -> DomainResult<(bool, bool)> {
        let _guard = self.ctx.lock_device(device.id).await?;
        let marked = self
            .ctx
            .bounded(
                "mark_offline_if_stale",
                self.ctx.store.mark_offline_if_stale(device.id, cutoff, now),
            )
            .await?;
        if !marked {
            // Checked in after the candidate list was read.
            return Ok((false, false));
        }

        tracing::info!(
            device_id = %device.id,
            last_seen_at = ?device.last_seen_at,
            "Device marked offline"
        );
        self.audit
            .record(
                AuditLogBuilder::new(&Actor::system(), AuditAction::DeviceOffline)
                    .on_target("device", device.id)
                    .with_details(json!({ "last_seen_at": device.last_seen_at })),
            )
            .await;

        // Wiped devices go offline silently.
        if device.is_wiped() {
            return Ok((true, false));
        }
        let outcome = self
            .alerts
            .raise(NewAlert {
                device_id: device.id,
                alert_type: AlertType::Offline,
                severity,
                description: format!("{} has not checked in since the offline threshold", device.hostname),
                latitude: device.last_location.as_ref().map(|l| l.latitude),
                longitude: device.last_location.as_ref().map(|l| l.longitude),
                geofence_id: None,
            })
            .await?;
        Ok((true, matches!(outcome, RaiseOutcome::Created(_))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertFilter, Connectivity, PageRequest, PolicySettings, Severity};
    use crate::services::context::Clock;
    use crate::services::testing::{ping, Harness};
    use chrono::Duration;

    async fn online_device(h: &Harness, serial: &str) -> uuid::Uuid {
        let device = h.register(serial).await;
        h.services.checkin.checkin(device, ping(1.0, 1.0)).await.unwrap();
        device
    }

    #[tokio::test]
    async fn test_sweep_threshold() {
        let h = Harness::new().await;
        let stale = online_device(&h, "SN-STALE").await;
        let fresh_at = h.clock.now() + Duration::hours(1) + Duration::minutes(1);
        h.clock.set(fresh_at);
        let fresh = online_device(&h, "SN-FRESH").await;

        // 25 h after the first check-in, 23 h 59 m after the second.
        let now = fresh_at + Duration::hours(23) + Duration::minutes(59);
        let report = h.services.sweep.run_once(now).await.unwrap();
        assert_eq!(report.marked_offline, 1);
        assert_eq!(report.alerts_raised, 1);

        let stale = h.services.devices.get(stale).await.unwrap();
        assert_eq!(stale.connectivity, Connectivity::Offline);
        let fresh = h.services.devices.get(fresh).await.unwrap();
        assert_eq!(fresh.connectivity, Connectivity::Online);
    }

    #[tokio::test]
    async fn test_sweep_alert_uses_policy_severity() {
        let h = Harness::with_policy(PolicySettings {
            offline_alert_severity: Severity::Critical,
            ..Default::default()
        })
        .await;
        let device = online_device(&h, "SN-CRIT").await;
        h.services
            .sweep
            .run_once(h.clock.now() + Duration::hours(25))
            .await
            .unwrap();
        let alerts = h
            .services
            .alerts
            .list(
                &AlertFilter {
                    device_id: Some(device),
                    ..Default::default()
                },
                &PageRequest::first(10),
            )
            .await
            .unwrap()
            .data;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Offline);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let h = Harness::new().await;
        online_device(&h, "SN-TWICE").await;
        let now = h.clock.now() + Duration::hours(25);
        assert_eq!(h.services.sweep.run_once(now).await.unwrap().marked_offline, 1);
        let second = h.services.sweep.run_once(now).await.unwrap();
        assert_eq!(second.candidates, 0);
        assert_eq!(second.marked_offline, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_never_seen_devices() {
        let h = Harness::new().await;
        h.register("SN-NEVER").await;
        let report = h
            .services
            .sweep
            .run_once(h.clock.now() + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(report.candidates, 0);
    }

    #[tokio::test]
    async fn test_wiped_device_goes_offline_without_alert() {
        let h = Harness::new().await;
        let wiped = online_device(&h, "SN-WIPEDSWEEP").await;
        h.wipe(wiped).await;
        assert_eq!(
            h.services.devices.get(wiped).await.unwrap().connectivity,
            Connectivity::Online
        );

        let report = h
            .services
            .sweep
            .run_once(h.clock.now() + Duration::days(30))
            .await
            .unwrap();
        assert_eq!(report.marked_offline, 1);
        assert_eq!(report.alerts_raised, 0);

        let device = h.services.devices.get(wiped).await.unwrap();
        assert_eq!(device.connectivity, Connectivity::Offline);
        assert!(device.is_wiped());
        let alerts = h
            .services
            .alerts
            .list(
                &AlertFilter {
                    device_id: Some(wiped),
                    alert_type: Some(AlertType::Offline),
                    ..Default::default()
                },
                &PageRequest::first(10),
            )
            .await
            .unwrap()
            .data;
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_recently_seen_device_stays_online() {
        let h = Harness::new().await;
        let device = online_device(&h, "SN-LATE").await;
        let sweep_now = h.clock.now() + Duration::hours(25);
        h.store
            .set_last_seen(device, Connectivity::Online, Some(sweep_now))
            .unwrap();
        let report = h.services.sweep.run_once(sweep_now).await.unwrap();
        assert_eq!(report.marked_offline, 0);
        assert_eq!(
            h.services.devices.get(device).await.unwrap().connectivity,
            Connectivity::Online
        );
    }
}
