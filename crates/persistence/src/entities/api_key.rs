//! API key entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::ApiKey;
use sqlx::FromRow;

/// Database row mapping for the api_keys table.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyEntity {
    pub id: i64,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKeyEntity> for ApiKey {
    fn from(entity: ApiKeyEntity) -> Self {
        Self {
            id: entity.id,
            key_hash: entity.key_hash,
            key_prefix: entity.key_prefix,
            name: entity.name,
            is_active: entity.is_active,
            expires_at: entity.expires_at,
            last_used_at: entity.last_used_at,
            created_at: entity.created_at,
        }
    }
}
