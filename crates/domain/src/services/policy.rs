//! Fleet policy: server-owned, versioned, optimistically updated.

use serde_json::json;
use validator::Validate;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use crate::error::{DomainError, DomainResult};
use crate::models::fleet_policy::UpdatePolicyRequest;
use crate::models::{AuditAction, FleetPolicy, PolicySettings};
use crate::store::PolicyStore;

#[derive(Debug, Clone)]
pub struct PolicyService {
    ctx: ServiceContext,
    audit: AuditService,
}

impl PolicyService {
    pub fn new(ctx: ServiceContext, audit: AuditService) -> Self {
        Self { ctx, audit }
    }

    /// Stores `settings` as version 1 unless a policy already exists.
    pub async fn seed(&self, settings: PolicySettings) -> DomainResult<FleetPolicy> {
        let initial = FleetPolicy::initial(settings, self.ctx.now());
        let policy = self
            .ctx
            .bounded("seed_policy", self.ctx.store.seed_policy(&initial))
            .await?;
        tracing::info!(version = policy.version, "Fleet policy ready");
        Ok(policy)
    }

    pub async fn current(&self) -> DomainResult<FleetPolicy> {
        self.ctx
            .bounded("current_policy", self.ctx.store.current_policy())
            .await?
            .ok_or_else(|| DomainError::Storage("fleet policy has not been seeded".to_string()))
    }

    /// Produces a new version if `expected_version` is still current.
    pub async fn update(
        &self,
        actor: &Actor,
        request: UpdatePolicyRequest,
    ) -> DomainResult<FleetPolicy> {
        request.validate()?;
        let current = self.current().await?;
        if current.version != request.expected_version {
            return Err(DomainError::Conflict(format!(
                "policy version is {}, expected {}",
                current.version, request.expected_version
            )));
        }
        let next = request.next_version(&current, Some(actor.label()), self.ctx.now());
        let stored = self
            .ctx
            .bounded(
                "append_policy_version",
                self.ctx
                    .store
                    .append_policy_version(&next, request.expected_version),
            )
            .await?;

        tracing::info!(
            version = stored.version,
            updated_by = %actor.label(),
            "Fleet policy updated"
        );
        self.audit
            .record(
                AuditLogBuilder::new(actor, AuditAction::PolicyUpdate)
                    .on_target("policy", stored.version)
                    .with_details(json!({
                        "from_version": current.version,
                        "before": current.settings,
                        "after": stored.settings,
                    })),
            )
            .await;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> PolicyService {
        let ctx = ServiceContext::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        PolicyService::new(ctx.clone(), AuditService::new(ctx))
    }

    #[tokio::test]
    async fn test_current_requires_seed() {
        let policy = service();
        assert!(matches!(
            policy.current().await,
            Err(DomainError::Storage(_))
        ));
        policy.seed(PolicySettings::default()).await.unwrap();
        assert_eq!(policy.current().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let policy = service();
        policy.seed(PolicySettings::default()).await.unwrap();
        let updated = policy
            .update(
                &Actor::admin("abcdefgh"),
                UpdatePolicyRequest {
                    expected_version: 1,
                    screenshot_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert!(!updated.settings.screenshot_enabled);
        assert_eq!(updated.updated_by.as_deref(), Some("abcdefgh"));
        assert_eq!(policy.current().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let policy = service();
        policy.seed(PolicySettings::default()).await.unwrap();
        let actor = Actor::admin("abcdefgh");
        policy
            .update(
                &actor,
                UpdatePolicyRequest {
                    expected_version: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = policy
            .update(
                &actor,
                UpdatePolicyRequest {
                    expected_version: 1,
                    remote_wipe_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(policy.current().await.unwrap().settings.remote_wipe_enabled);
    }

    #[tokio::test]
    async fn test_update_validates() {
        let policy = service();
        policy.seed(PolicySettings::default()).await.unwrap();
        let err = policy
            .update(
                &Actor::admin("abcdefgh"),
                UpdatePolicyRequest {
                    expected_version: 1,
                    alert_debounce_secs: Some(-5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
