//! Geofence administration.

use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use crate::error::{DomainError, DomainResult};
use crate::models::geofence::{CreateGeofenceRequest, UpdateGeofenceRequest};
use crate::models::{AuditAction, Geofence};
use crate::store::GeofenceStore;

#[derive(Debug, Clone)]
pub struct GeofenceService {
    ctx: ServiceContext,
    audit: AuditService,
}

impl GeofenceService {
    pub fn new(ctx: ServiceContext, audit: AuditService) -> Self {
        Self { ctx, audit }
    }

    pub async fn create(&self, actor: &Actor, request: CreateGeofenceRequest) -> DomainResult<Geofence> {
        request.validate()?;
        request.shape.validate()?;

        let now = self.ctx.now();
        let fence = Geofence {
            id: Uuid::new_v4(),
            name: request.name,
            shape: request.shape,
            active: request.active,
            department: request.department,
            alert_on_enter: request.alert_on_enter,
            alert_on_exit: request.alert_on_exit,
            alert_severity: request.alert_severity,
            created_at: now,
            updated_at: now,
        };
        let fence = self
            .ctx
            .bounded("insert_geofence", self.ctx.store.insert_geofence(&fence))
            .await?;

        tracing::info!(geofence_id = %fence.id, name = %fence.name, shape = fence.shape.kind(), "Geofence created");
        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::GeofenceCreate)
                    .on_target("geofence", fence.id)
                    .with_details(json!({ "name": fence.name, "shape": fence.shape.kind() })),
            )
            .await;
        Ok(fence)
    }

    /// Partial update. Changing the geometry or reactivating the fence drops
    /// stored memberships; the next check-in of each device compares against
    /// its last reported location under the new geometry.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        request: UpdateGeofenceRequest,
    ) -> DomainResult<Geofence> {
        request.validate()?;
        if let Some(shape) = &request.shape {
            shape.validate()?;
        }

        let before = self.get(id).await?;
        let mut fence = before.clone();
        request.apply(&mut fence, self.ctx.now());
        let reset = fence.shape != before.shape || (fence.active && !before.active);

        let fence = self
            .ctx
            .bounded("update_geofence", self.ctx.store.update_geofence(&fence, reset))
            .await?;

        tracing::info!(geofence_id = %id, memberships_reset = reset, "Geofence updated");
        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::GeofenceUpdate)
                    .on_target("geofence", id)
                    .with_details(json!({ "before": before, "after": fence })),
            )
            .await;
        Ok(fence)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Geofence> {
        self.ctx
            .bounded("find_geofence", self.ctx.store.find_geofence(id))
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("geofence {}", id)))
    }

    pub async fn list(&self, include_inactive: bool) -> DomainResult<Vec<Geofence>> {
        self.ctx
            .bounded("list_geofences", self.ctx.store.list_geofences(include_inactive))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, GeofenceShape, Severity};
    use crate::services::testing::{ping, Harness};
    use tokio_test::{assert_err, assert_ok};

    fn circle_request(radius: f64) -> CreateGeofenceRequest {
        CreateGeofenceRequest {
            name: "Warehouse".into(),
            shape: GeofenceShape::Circle {
                center_lat: 0.0,
                center_lon: 0.0,
                radius_meters: radius,
            },
            active: true,
            department: None,
            alert_on_enter: true,
            alert_on_exit: true,
            alert_severity: Severity::Medium,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let h = Harness::new().await;
        let fence = assert_ok!(h.services.geofences.create(&h.admin(), circle_request(100.0)).await);
        assert_eq!(assert_ok!(h.services.geofences.get(fence.id).await), fence);
        assert_eq!(h.services.geofences.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_shape() {
        let h = Harness::new().await;
        let err = h
            .services
            .geofences
            .create(&h.admin(), circle_request(-5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut polygon = circle_request(1.0);
        polygon.shape = GeofenceShape::Polygon {
            vertices: vec![[0.0, 0.0], [1.0, 1.0]],
        };
        let err = h.services.geofences.create(&h.admin(), polygon).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deactivated_fence_hidden_from_default_list() {
        let h = Harness::new().await;
        let fence = h.services.geofences.create(&h.admin(), circle_request(100.0)).await.unwrap();
        h.services
            .geofences
            .update(
                &h.admin(),
                fence.id,
                UpdateGeofenceRequest {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(h.services.geofences.list(false).await.unwrap().is_empty());
        assert_eq!(h.services.geofences.list(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reshape_compares_last_location_against_new_shape() {
        let h = Harness::new().await;
        let device = h.register("SN-RESHAPE").await;
        let fence = h.services.geofences.create(&h.admin(), circle_request(100.0)).await.unwrap();
        h.services.checkin.checkin(device, ping(0.0, 0.0)).await.unwrap();

        // Move the fence away: the last location is outside the new shape
        // too, so staying put is not an exit.
        h.services
            .geofences
            .update(
                &h.admin(),
                fence.id,
                UpdateGeofenceRequest {
                    shape: Some(GeofenceShape::Circle {
                        center_lat: 10.0,
                        center_lon: 10.0,
                        radius_meters: 100.0,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let out = h.services.checkin.checkin(device, ping(0.0, 0.0)).await.unwrap();
        assert!(out.alerts.is_empty());

        let enter = h.services.checkin.checkin(device, ping(10.0, 10.0)).await.unwrap();
        assert_eq!(enter.alerts.len(), 1);
        assert_eq!(enter.alerts[0].alert_type, AlertType::GeofenceEnter);
    }

    #[tokio::test]
    async fn test_update_unknown_not_found() {
        let h = Harness::new().await;
        let err = assert_err!(
            h.services
                .geofences
                .update(&h.admin(), Uuid::new_v4(), UpdateGeofenceRequest::default())
                .await
        );
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
