//! Audit logging for admin, agent and system actions.
//!
//! Entries are append-only. A failed audit write is logged and never fails
//! the action that produced it.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::context::ServiceContext;
use crate::error::DomainResult;
use crate::models::{
    ActorType, AuditAction, AuditFilter, AuditLogEntry, NewAuditEntry, Page, PageRequest,
};
use crate::store::AuditStore;

/// The principal performing an action, plus request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
}

impl Actor {
    /// Admin identified by the display prefix of its API key.
    pub fn admin(key_prefix: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Admin,
            actor_id: Some(key_prefix.into()),
            ip_address: None,
        }
    }

    pub fn agent(device_id: Uuid) -> Self {
        Self {
            actor_type: ActorType::Agent,
            actor_id: Some(device_id.to_string()),
            ip_address: None,
        }
    }

    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            actor_id: None,
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Identifier recorded as `issued_by` / `updated_by`.
    pub fn label(&self) -> String {
        match &self.actor_id {
            Some(id) => id.clone(),
            None => self.actor_type.to_string(),
        }
    }
}

/// Builder for audit entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    actor: Actor,
    action: AuditAction,
    target_type: String,
    target_id: Option<String>,
    details: Option<JsonValue>,
}

impl AuditLogBuilder {
    pub fn new(actor: &Actor, action: AuditAction) -> Self {
        Self {
            actor: actor.clone(),
            action,
            target_type: String::new(),
            target_id: None,
            details: None,
        }
    }

    /// Set the target being acted upon.
    pub fn on_target(mut self, target_type: impl Into<String>, target_id: impl ToString) -> Self {
        self.target_type = target_type.into();
        self.target_id = Some(target_id.to_string());
        self
    }

    /// Set just the target type (when no ID is available).
    pub fn on_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self, at: DateTime<Utc>) -> NewAuditEntry {
        NewAuditEntry {
            actor_type: self.actor.actor_type,
            actor_id: self.actor.actor_id,
            action: self.action,
            target_type: self.target_type,
            target_id: self.target_id,
            details: self.details,
            ip_address: self.actor.ip_address,
            created_at: at,
        }
    }
}

/// Appends and lists audit entries.
#[derive(Debug, Clone)]
pub struct AuditService {
    ctx: ServiceContext,
}

impl AuditService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Appends an entry. Failures are logged, not returned.
    pub async fn record(&self, builder: AuditLogBuilder) {
        let entry = builder.build(self.ctx.now());
        let action = entry.action;
        if let Err(e) = self
            .ctx
            .bounded("append_audit", self.ctx.store.append_audit(entry))
            .await
        {
            tracing::error!(action = %action, error = %e, "Failed to write audit entry");
        }
    }

    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: &PageRequest<i64>,
    ) -> DomainResult<Page<AuditLogEntry>> {
        let rows = self
            .ctx
            .bounded("list_audit", self.ctx.store.list_audit(filter, page))
            .await?;
        Ok(Page::from_rows(rows, page.limit, |e| (e.created_at, e.id)))
    }
}
