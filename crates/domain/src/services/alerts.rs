//! Alert generation with debounce, and forward-only triage transitions.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use super::policy::PolicyService;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    Alert, AlertFilter, AlertStatus, AuditAction, NewAlert, Page, PageRequest,
};
use crate::store::AlertStore;

/// What `raise` did.
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseOutcome {
    Created(Alert),
    /// An alert with the same key exists inside the debounce window.
    Suppressed { existing: Alert },
}

impl RaiseOutcome {
    pub fn created(&self) -> Option<&Alert> {
        match self {
            Self::Created(alert) => Some(alert),
            Self::Suppressed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertService {
    ctx: ServiceContext,
    policy: PolicyService,
    audit: AuditService,
}

impl AlertService {
    pub fn new(ctx: ServiceContext, policy: PolicyService, audit: AuditService) -> Self {
        Self { ctx, policy, audit }
    }

    /// Returns the alert that suppresses `candidate`, if any.
    ///
    /// The debounce key is `(device_id, alert_type, geofence_id)`.
    pub async fn find_debouncing(
        &self,
        candidate: &NewAlert,
        now: DateTime<Utc>,
        window: Duration,
    ) -> DomainResult<Option<Alert>> {
        if window <= Duration::zero() {
            return Ok(None);
        }
        self.ctx
            .bounded(
                "latest_alert_since",
                self.ctx.store.latest_alert_since(
                    candidate.device_id,
                    candidate.alert_type,
                    candidate.geofence_id,
                    now - window,
                ),
            )
            .await
    }

    /// Creates an `unacknowledged` alert unless debounced.
    ///
    /// Callers hold the device lock so the read and the write cannot
    /// interleave with another raise for the same device.
    pub async fn raise(&self, candidate: NewAlert) -> DomainResult<RaiseOutcome> {
        let now = self.ctx.now();
        let window = self.policy.current().await?.alert_debounce();
        if let Some(existing) = self.find_debouncing(&candidate, now, window).await? {
            tracing::debug!(
                device_id = %candidate.device_id,
                alert_type = %candidate.alert_type,
                existing_alert_id = %existing.id,
                "Alert suppressed by debounce"
            );
            return Ok(RaiseOutcome::Suppressed { existing });
        }

        let alert = candidate.into_alert(Uuid::new_v4(), now);
        let alert = self
            .ctx
            .bounded("insert_alert", self.ctx.store.insert_alert(&alert))
            .await?;
        tracing::info!(
            alert_id = %alert.id,
            device_id = %alert.device_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            "Alert raised"
        );
        Ok(RaiseOutcome::Created(alert))
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Alert> {
        self.ctx
            .bounded("find_alert", self.ctx.store.find_alert(id))
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("alert {}", id)))
    }

    /// unacknowledged -> acknowledged.
    pub async fn acknowledge(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> DomainResult<Alert> {
        self.transition(
            actor,
            id,
            &[AlertStatus::Unacknowledged],
            AlertStatus::Acknowledged,
            notes,
            AuditAction::AlertAcknowledge,
        )
        .await
    }

    /// unacknowledged | acknowledged -> resolved.
    pub async fn resolve(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> DomainResult<Alert> {
        self.transition(
            actor,
            id,
            &[AlertStatus::Unacknowledged, AlertStatus::Acknowledged],
            AlertStatus::Resolved,
            notes,
            AuditAction::AlertResolve,
        )
        .await
    }

    pub async fn list(
        &self,
        filter: &AlertFilter,
        page: &PageRequest<Uuid>,
    ) -> DomainResult<Page<Alert>> {
        let rows = self
            .ctx
            .bounded("list_alerts", self.ctx.store.list_alerts(filter, page))
            .await?;
        Ok(Page::from_rows(rows, page.limit, |a| (a.created_at, a.id)))
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        from: &[AlertStatus],
        to: AlertStatus,
        notes: Option<String>,
        action: AuditAction,
    ) -> DomainResult<Alert> {
        let changed = self
            .ctx
            .bounded(
                "transition_alert",
                self.ctx
                    .store
                    .transition_alert(id, from, to, notes.as_deref(), self.ctx.now()),
            )
            .await?;

        let Some(alert) = changed else {
            let current = self.get(id).await?;
            return Err(DomainError::InvalidStateTransition(format!(
                "alert is {} and cannot become {}",
                current.status, to
            )));
        };

        tracing::info!(alert_id = %id, status = %to, "Alert status changed");
        self.audit
            .record(
                AuditLogBuilder::new(actor, action)
                    .on_target("alert", id)
                    .with_details(json!({ "status": to, "notes": notes })),
            )
            .await;
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, PolicySettings, Severity};
    use crate::services::context::ManualClock;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    struct Fixture {
        alerts: AlertService,
        clock: Arc<ManualClock>,
    }

    async fn fixture(debounce_secs: i64) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = ServiceContext::new(Arc::new(MemoryStore::new()), std::time::Duration::from_secs(1))
            .with_clock(clock.clone());
        let audit = AuditService::new(ctx.clone());
        let policy = PolicyService::new(ctx.clone(), audit.clone());
        policy
            .seed(PolicySettings {
                alert_debounce_secs: debounce_secs,
                ..Default::default()
            })
            .await
            .unwrap();
        Fixture {
            alerts: AlertService::new(ctx, policy, audit),
            clock,
        }
    }

    fn offline(device_id: Uuid) -> NewAlert {
        NewAlert {
            device_id,
            alert_type: AlertType::Offline,
            severity: Severity::Medium,
            description: "Device went offline".into(),
            latitude: None,
            longitude: None,
            geofence_id: None,
        }
    }

    #[tokio::test]
    async fn test_raise_creates_unacknowledged() {
        let f = fixture(300).await;
        let outcome = f.alerts.raise(offline(Uuid::new_v4())).await.unwrap();
        let alert = outcome.created().unwrap();
        assert_eq!(alert.status, AlertStatus::Unacknowledged);
    }

    #[tokio::test]
    async fn test_debounce_window() {
        let f = fixture(300).await;
        let device = Uuid::new_v4();
        let first = f.alerts.raise(offline(device)).await.unwrap();
        let first = first.created().unwrap().clone();

        f.clock.advance(Duration::seconds(299));
        match f.alerts.raise(offline(device)).await.unwrap() {
            RaiseOutcome::Suppressed { existing } => assert_eq!(existing.id, first.id),
            other => panic!("expected suppression, got {:?}", other),
        }

        // A different key is not debounced.
        assert!(f.alerts.raise(offline(Uuid::new_v4())).await.unwrap().created().is_some());

        f.clock.advance(Duration::seconds(2));
        assert!(f.alerts.raise(offline(device)).await.unwrap().created().is_some());
    }

    #[tokio::test]
    async fn test_debounce_keyed_by_geofence() {
        let f = fixture(300).await;
        let device = Uuid::new_v4();
        let mut a = offline(device);
        a.alert_type = AlertType::GeofenceExit;
        a.geofence_id = Some(Uuid::new_v4());
        let mut b = a.clone();
        b.geofence_id = Some(Uuid::new_v4());
        assert!(f.alerts.raise(a.clone()).await.unwrap().created().is_some());
        assert!(f.alerts.raise(b).await.unwrap().created().is_some());
        assert!(f.alerts.raise(a).await.unwrap().created().is_none());
    }

    #[tokio::test]
    async fn test_zero_debounce_never_suppresses() {
        let f = fixture(0).await;
        let device = Uuid::new_v4();
        assert!(f.alerts.raise(offline(device)).await.unwrap().created().is_some());
        assert!(f.alerts.raise(offline(device)).await.unwrap().created().is_some());
    }

    #[tokio::test]
    async fn test_acknowledge_then_resolve() {
        let f = fixture(300).await;
        let actor = Actor::admin("abcdefgh");
        let alert = f.alerts.raise(offline(Uuid::new_v4())).await.unwrap();
        let id = alert.created().unwrap().id;

        let acked = f.alerts.acknowledge(&actor, id, Some("on it".into())).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_notes.as_deref(), Some("on it"));

        let err = f.alerts.acknowledge(&actor, id, None).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));

        let resolved = f.alerts.resolve(&actor, id, Some("found".into())).await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        let err = f.alerts.resolve(&actor, id, None).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
        let err = f.alerts.acknowledge(&actor, id, None).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_resolve_directly_from_unacknowledged() {
        let f = fixture(300).await;
        let alert = f.alerts.raise(offline(Uuid::new_v4())).await.unwrap();
        let id = alert.created().unwrap().id;
        let resolved = f
            .alerts
            .resolve(&Actor::admin("abcdefgh"), id, None)
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.acknowledged_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_alert_not_found() {
        let f = fixture(300).await;
        let err = f
            .alerts
            .acknowledge(&Actor::admin("abcdefgh"), Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let f = fixture(0).await;
        let device = Uuid::new_v4();
        for _ in 0..3 {
            f.alerts.raise(offline(device)).await.unwrap();
            f.clock.advance(Duration::seconds(1));
        }
        f.alerts.raise(offline(Uuid::new_v4())).await.unwrap();

        let filter = AlertFilter {
            device_id: Some(device),
            ..Default::default()
        };
        let page = f.alerts.list(&filter, &PageRequest::first(2)).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.pagination.has_more);
        assert!(page.data[0].created_at > page.data[1].created_at);

        let cursor = page.pagination.next_cursor.unwrap();
        let next = PageRequest::from_query(Some(2), Some(&cursor)).unwrap();
        let page2 = f.alerts.list(&filter, &next).await.unwrap();
        assert_eq!(page2.data.len(), 1);
        assert!(!page2.pagination.has_more);
    }
}
