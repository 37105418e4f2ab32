//! Admin principal extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::services::{Actor, AdminPrincipal};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::client_ip::ClientIp;
use crate::middleware::auth::API_KEY_HEADER;

/// The authenticated admin for this request.
///
/// Uses the principal stored by [`crate::middleware::require_admin`] when
/// present, otherwise validates `X-API-Key` itself.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub principal: AdminPrincipal,
    pub ip_address: Option<String>,
}

impl AdminAuth {
    /// Audit actor for changes made by this admin.
    pub fn actor(&self) -> Actor {
        self.principal.actor().with_ip(self.ip_address.clone())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ClientIp(ip_address) = ClientIp::from_parts(parts);

        if let Some(principal) = parts.extensions.get::<AdminPrincipal>() {
            return Ok(Self {
                principal: principal.clone(),
                ip_address,
            });
        }

        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

        let principal = state.services.registration.authenticate_admin(api_key).await?;
        Ok(Self {
            principal,
            ip_address,
        })
    }
}
