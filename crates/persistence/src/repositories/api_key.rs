//! Repository for admin API keys.

use chrono::{DateTime, Utc};
use domain::models::NewApiKey;
use sqlx::PgPool;

use crate::entities::ApiKeyEntity;
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds an API key by its hash.
    pub async fn find_by_key_hash(&self, key_hash: &str) -> Result<Option<ApiKeyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_api_key_by_hash");
        let result = sqlx::query_as::<_, ApiKeyEntity>(
            r#"
            SELECT id, key_hash, key_prefix, name, is_active, expires_at, last_used_at, created_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    pub async fn update_last_used(&self, key_id: i64, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("touch_api_key");
        let result = sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(key_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map(|_| ());
        timer.finish(result)
    }

    /// Inserts the key unless its hash is already stored, then returns the
    /// stored row.
    pub async fn ensure(&self, key: &NewApiKey) -> Result<ApiKeyEntity, sqlx::Error> {
        let timer = QueryTimer::new("ensure_api_key");
        let result: Result<ApiKeyEntity, sqlx::Error> = async {
            sqlx::query(
                r#"
                INSERT INTO api_keys (key_hash, key_prefix, name, is_active, expires_at)
                VALUES ($1, $2, $3, TRUE, $4)
                ON CONFLICT (key_hash) DO NOTHING
                "#,
            )
            .bind(&key.key_hash)
            .bind(&key.key_prefix)
            .bind(&key.name)
            .bind(key.expires_at)
            .execute(&self.pool)
            .await?;
            sqlx::query_as::<_, ApiKeyEntity>(
                r#"
                SELECT id, key_hash, key_prefix, name, is_active, expires_at, last_used_at, created_at
                FROM api_keys
                WHERE key_hash = $1
                "#,
            )
            .bind(&key.key_hash)
            .fetch_one(&self.pool)
            .await
        }
        .await;
        timer.finish(result)
    }
}
