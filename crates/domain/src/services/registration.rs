//! Agent registration and credential checks for agents and admins.

use serde_json::json;
use shared::crypto::{
    extract_key_prefix, generate_token, hmac_sha256_hex, sha256_hex, ADMIN_KEY_PREFIX,
    AGENT_TOKEN_PREFIX,
};
use uuid::Uuid;
use validator::Validate;

use super::audit::{Actor, AuditLogBuilder, AuditService};
use super::context::ServiceContext;
use crate::error::{DomainError, DomainResult};
use crate::models::device::{RegisterAgentRequest, RegisterAgentResponse};
use crate::models::{ApiKey, AuditAction, Device, NewApiKey, NewDevice};
use crate::store::{ApiKeyStore, DeviceStore};

/// Secrets the registration flow needs.
#[derive(Clone, Default)]
pub struct RegistrationSettings {
    /// HMAC key for stored agent token digests.
    pub token_secret: String,
    /// Shared enrollment code; `None` disables the check.
    pub registration_code: Option<String>,
}

impl std::fmt::Debug for RegistrationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationSettings")
            .field("token_secret", &"<redacted>")
            .field("registration_code", &self.registration_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An authenticated admin key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub key_id: i64,
    pub key_prefix: String,
    pub name: String,
}

impl AdminPrincipal {
    pub fn actor(&self) -> Actor {
        Actor::admin(self.key_prefix.clone())
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationService {
    ctx: ServiceContext,
    audit: AuditService,
    settings: RegistrationSettings,
}

impl RegistrationService {
    pub fn new(ctx: ServiceContext, audit: AuditService, settings: RegistrationSettings) -> Self {
        Self {
            ctx,
            audit,
            settings,
        }
    }

    fn token_hash(&self, token: &str) -> String {
        hmac_sha256_hex(&self.settings.token_secret, token)
    }

    /// Registers a new device or re-registers a known serial number. The
    /// returned token is the only copy; only its digest is stored.
    pub async fn register(
        &self,
        request: RegisterAgentRequest,
        ip_address: Option<String>,
    ) -> DomainResult<RegisterAgentResponse> {
        if let Some(expected) = &self.settings.registration_code {
            if request.registration_code.as_deref() != Some(expected.as_str()) {
                tracing::warn!(serial_number = %request.serial_number, "Registration with bad code");
                return Err(DomainError::Unauthorized("invalid registration code".to_string()));
            }
        }
        request.validate()?;

        let token = generate_token(AGENT_TOKEN_PREFIX);
        let token_hash = self.token_hash(&token);
        let now = self.ctx.now();

        let existing = self
            .ctx
            .bounded(
                "find_device_by_serial",
                self.ctx.store.find_device_by_serial(&request.serial_number),
            )
            .await?;

        let (device, action) = match existing {
            Some(device) => {
                let _guard = self.ctx.lock_device(device.id).await?;
                if device.is_wiped() {
                    return Err(DomainError::InvalidStateTransition(format!(
                        "device {} has been wiped and cannot re-register",
                        device.id
                    )));
                }
                let device = self
                    .ctx
                    .bounded(
                        "rotate_agent_token",
                        self.ctx
                            .store
                            .rotate_agent_token(device.id, &request.hostname, &token_hash, now),
                    )
                    .await?;
                (device, AuditAction::DeviceTokenRotate)
            }
            None => {
                let device = self
                    .ctx
                    .bounded(
                        "create_device",
                        self.ctx.store.create_device(NewDevice {
                            id: Uuid::new_v4(),
                            serial_number: request.serial_number.clone(),
                            hostname: request.hostname.clone(),
                            agent_token_hash: token_hash,
                            created_at: now,
                        }),
                    )
                    .await?;
                (device, AuditAction::DeviceRegister)
            }
        };

        tracing::info!(
            device_id = %device.id,
            serial_number = %device.serial_number,
            action = %action,
            "Agent registered"
        );
        self.audit
            .record(
                AuditLogBuilder::new(&Actor::agent(device.id).with_ip(ip_address), action)
                    .on_target("device", device.id)
                    .with_details(json!({
                        "serial_number": device.serial_number,
                        "hostname": device.hostname,
                    })),
            )
            .await;

        Ok(RegisterAgentResponse {
            device_id: device.id,
            agent_token: token,
        })
    }

    /// Resolves an agent bearer token to its active device.
    pub async fn authenticate_agent(&self, token: &str) -> DomainResult<Device> {
        if !token.starts_with(AGENT_TOKEN_PREFIX) {
            return Err(DomainError::Unauthorized("invalid agent token".to_string()));
        }
        let hash = self.token_hash(token);
        self.ctx
            .bounded(
                "find_device_by_token_hash",
                self.ctx.store.find_device_by_token_hash(&hash),
            )
            .await?
            .filter(|d| d.active)
            .ok_or_else(|| DomainError::Unauthorized("invalid agent token".to_string()))
    }

    /// Resolves an `X-API-Key` value to an admin principal.
    pub async fn authenticate_admin(&self, key: &str) -> DomainResult<AdminPrincipal> {
        let prefix = extract_key_prefix(key, ADMIN_KEY_PREFIX)
            .ok_or_else(|| DomainError::Unauthorized("invalid API key format".to_string()))?;
        let hash = sha256_hex(key);
        let now = self.ctx.now();
        let api_key = self
            .ctx
            .bounded("find_api_key_by_hash", self.ctx.store.find_api_key_by_hash(&hash))
            .await?
            .filter(|k| k.key_prefix == prefix)
            .ok_or_else(|| DomainError::Unauthorized("invalid API key".to_string()))?;
        if !api_key.is_valid_at(now) {
            return Err(DomainError::Unauthorized("API key is inactive or expired".to_string()));
        }

        if let Err(e) = self
            .ctx
            .bounded("touch_api_key", self.ctx.store.touch_api_key(api_key.id, now))
            .await
        {
            tracing::warn!(key_id = api_key.id, error = %e, "Failed to update API key last_used_at");
        }
        Ok(AdminPrincipal {
            key_id: api_key.id,
            key_prefix: api_key.key_prefix,
            name: api_key.name,
        })
    }

    /// Stores a configured admin key (idempotent).
    pub async fn ensure_admin_key(&self, key: &str, name: &str) -> DomainResult<ApiKey> {
        let prefix = extract_key_prefix(key, ADMIN_KEY_PREFIX).ok_or_else(|| {
            DomainError::Validation(format!(
                "admin key must start with '{}' followed by at least 8 characters",
                ADMIN_KEY_PREFIX
            ))
        })?;
        let stored = self
            .ctx
            .bounded(
                "ensure_api_key",
                self.ctx.store.ensure_api_key(NewApiKey {
                    key_hash: sha256_hex(key),
                    key_prefix: prefix.to_string(),
                    name: name.to_string(),
                    expires_at: None,
                }),
            )
            .await?;
        tracing::info!(key_prefix = %stored.key_prefix, "Admin API key ready");
        Ok(stored)
    }
}
