//! Audit log repository. Rows are append-only.

use domain::models::{AuditFilter, NewAuditEntry, PageCursor};
use sqlx::PgPool;

use crate::entities::{AuditLogEntity, AUDIT_COLUMNS};
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &NewAuditEntry) -> Result<AuditLogEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_audit_log");
        let sql = format!(
            r#"
            INSERT INTO audit_logs (actor_type, actor_id, action, target_type, target_id,
                                    details, ip_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            AUDIT_COLUMNS
        );
        let result = sqlx::query_as::<_, AuditLogEntity>(&sql)
            .bind(entry.actor_type.to_string())
            .bind(&entry.actor_id)
            .bind(entry.action.as_str())
            .bind(&entry.target_type)
            .bind(&entry.target_id)
            .bind(&entry.details)
            .bind(&entry.ip_address)
            .bind(entry.created_at)
            .fetch_one(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Newest first, strictly after the cursor.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        after: Option<&PageCursor<i64>>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_audit_logs");
        let sql = format!(
            r#"
            SELECT {}
            FROM audit_logs
            WHERE ($1::TEXT IS NULL OR target_type = $1)
              AND ($2::TEXT IS NULL OR target_id = $2)
              AND ($3::TEXT IS NULL OR action = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR (created_at, id) < ($4, $5))
            ORDER BY created_at DESC, id DESC
            LIMIT $6
            "#,
            AUDIT_COLUMNS
        );
        let result = sqlx::query_as::<_, AuditLogEntity>(&sql)
            .bind(&filter.target_type)
            .bind(&filter.target_id)
            .bind(filter.action.map(|a| a.as_str()))
            .bind(after.map(|c| c.created_at))
            .bind(after.map(|c| c.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }
}
