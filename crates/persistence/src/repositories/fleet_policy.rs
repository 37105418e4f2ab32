//! Fleet policy repository. Each update appends a new version row.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::entities::FleetPolicyEntity;
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct FleetPolicyRepository {
    pool: PgPool,
}

impl FleetPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn current(&self) -> Result<Option<FleetPolicyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("current_fleet_policy");
        let result = sqlx::query_as::<_, FleetPolicyEntity>(
            r#"
            SELECT version, settings, updated_by, updated_at
            FROM fleet_policies
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Inserts `version` unless that version already exists. Returns `None`
    /// when another writer got there first.
    pub async fn insert_version(
        &self,
        version: i32,
        settings: JsonValue,
        updated_by: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<FleetPolicyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_fleet_policy_version");
        let result = sqlx::query_as::<_, FleetPolicyEntity>(
            r#"
            INSERT INTO fleet_policies (version, settings, updated_by, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (version) DO NOTHING
            RETURNING version, settings, updated_by, updated_at
            "#,
        )
        .bind(version)
        .bind(settings)
        .bind(updated_by)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }
}
