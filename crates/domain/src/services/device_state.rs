//! Admin-facing device operations.
//!
//! Connectivity and management state are never written here: check-ins and
//! the sweep own connectivity, executed commands own management.

use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use crate::error::{DomainError, DomainResult};
use crate::models::device::UpdateDeviceRequest;
use crate::models::{AuditAction, Device, LocationSample};
use crate::store::{DeviceAssignment, DeviceFilter, DeviceStore, LocationStore};

/// Upper bound on samples returned by one history request.
pub const MAX_LOCATION_HISTORY: i64 = 500;

/// `Some("")` clears a field, `None` keeps it.
fn merge(current: Option<String>, update: Option<String>) -> Option<String> {
    match update {
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value),
        None => current,
    }
}

#[derive(Debug, Clone)]
pub struct DeviceService {
    ctx: ServiceContext,
    audit: AuditService,
}

impl DeviceService {
    pub fn new(ctx: ServiceContext, audit: AuditService) -> Self {
        Self { ctx, audit }
    }

    pub async fn get(&self, device_id: Uuid) -> DomainResult<Device> {
        self.ctx
            .bounded("find_device", self.ctx.store.find_device(device_id))
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("device {}", device_id)))
    }

    pub async fn list(&self, filter: &DeviceFilter) -> DomainResult<Vec<Device>> {
        self.ctx
            .bounded("list_devices", self.ctx.store.list_devices(filter))
            .await
    }

    /// Most recent location samples, newest first.
    pub async fn recent_locations(
        &self,
        device_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<LocationSample>> {
        self.get(device_id).await?;
        let limit = limit.clamp(1, MAX_LOCATION_HISTORY);
        self.ctx
            .bounded("recent_samples", self.ctx.store.recent_samples(device_id, limit))
            .await
    }

    pub async fn update_assignment(
        &self,
        actor: &Actor,
        device_id: Uuid,
        request: UpdateDeviceRequest,
    ) -> DomainResult<Device> {
        request.validate()?;
        let current = self.get(device_id).await?;
        let assignment = DeviceAssignment {
            asset_tag: merge(current.asset_tag.clone(), request.asset_tag),
            employee: merge(current.employee.clone(), request.employee),
            department: merge(current.department.clone(), request.department),
        };
        let updated = self
            .ctx
            .bounded(
                "update_device_assignment",
                self.ctx
                    .store
                    .update_device_assignment(device_id, &assignment, self.ctx.now()),
            )
            .await?;

        tracing::info!(device_id = %device_id, "Device assignment updated");
        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::DeviceUpdate)
                    .on_target("device", device_id)
                    .with_details(json!({
                        "before": {
                            "asset_tag": current.asset_tag,
                            "employee": current.employee,
                            "department": current.department,
                        },
                        "after": {
                            "asset_tag": updated.asset_tag,
                            "employee": updated.employee,
                            "department": updated.department,
                        },
                    })),
            )
            .await;
        Ok(updated)
    }

    /// Soft delete. Refused while commands are pending or sent.
    pub async fn deactivate(&self, actor: &Actor, device_id: Uuid) -> DomainResult<Device> {
        let _guard = self.ctx.lock_device(device_id).await?;
        let device = self.get(device_id).await?;
        if !device.active {
            return Ok(device);
        }
        let device = self
            .ctx
            .bounded(
                "deactivate_device",
                self.ctx.store.deactivate_device(device_id, self.ctx.now()),
            )
            .await?;

        tracing::info!(device_id = %device_id, "Device deactivated");
        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::DeviceDeactivate)
                    .on_target("device", device_id)
                    .with_details(json!({ "serial_number": device.serial_number })),
            )
            .await;
        Ok(device)
    }
}
