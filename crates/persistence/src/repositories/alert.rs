//! Alert repository.

use chrono::{DateTime, Utc};
use domain::models::{Alert, AlertFilter, AlertStatus, AlertType, PageCursor};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{AlertEntity, ALERT_COLUMNS};
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_pooled(&self, alert: &Alert) -> Result<AlertEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_alert");
        let result: Result<AlertEntity, sqlx::Error> = async {
            let mut conn = self.pool.acquire().await?;
            Self::insert(&mut *conn, alert).await
        }
        .await;
        timer.finish(result)
    }

    pub async fn insert(conn: &mut PgConnection, alert: &Alert) -> Result<AlertEntity, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO alerts (id, device_id, alert_type, severity, status, description,
                                latitude, longitude, geofence_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(alert.id)
            .bind(alert.device_id)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.status.as_str())
            .bind(&alert.description)
            .bind(alert.latitude)
            .bind(alert.longitude)
            .bind(alert.geofence_id)
            .bind(alert.created_at)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AlertEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_alert_by_id");
        let sql = format!("SELECT {} FROM alerts WHERE id = $1", ALERT_COLUMNS);
        let result = sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Newest alert for the debounce key created at or after `since`.
    pub async fn latest_since(
        &self,
        device_id: Uuid,
        alert_type: AlertType,
        geofence_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<Option<AlertEntity>, sqlx::Error> {
        let timer = QueryTimer::new("latest_alert_since");
        let sql = format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE device_id = $1
              AND alert_type = $2
              AND geofence_id IS NOT DISTINCT FROM $3
              AND created_at >= $4
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            ALERT_COLUMNS
        );
        let result = sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(device_id)
            .bind(alert_type.as_str())
            .bind(geofence_id)
            .bind(since)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Compare-and-set on status. Acknowledging stamps the acknowledgement
    /// columns; resolving stamps the resolution columns.
    pub async fn transition(
        &self,
        id: Uuid,
        from: &[AlertStatus],
        to: AlertStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<AlertEntity>, sqlx::Error> {
        let timer = QueryTimer::new("transition_alert");
        let from: Vec<&str> = from.iter().map(AlertStatus::as_str).collect();
        let sql = format!(
            r#"
            UPDATE alerts
            SET status = $2::TEXT,
                acknowledged_at = CASE WHEN $2::TEXT = 'acknowledged' THEN $4 ELSE acknowledged_at END,
                acknowledged_notes = CASE WHEN $2::TEXT = 'acknowledged' THEN $5 ELSE acknowledged_notes END,
                resolved_at = CASE WHEN $2::TEXT = 'resolved' THEN $4 ELSE resolved_at END,
                resolution_notes = CASE WHEN $2::TEXT = 'resolved' THEN $5 ELSE resolution_notes END
            WHERE id = $1 AND status = ANY($3)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );
        let result = sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(id)
            .bind(to.as_str())
            .bind(&from)
            .bind(at)
            .bind(notes)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Newest first, strictly after the cursor.
    pub async fn list(
        &self,
        filter: &AlertFilter,
        after: Option<&PageCursor<Uuid>>,
        limit: i64,
    ) -> Result<Vec<AlertEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_alerts");
        let sql = format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE ($1::UUID IS NULL OR device_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR alert_type = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR (created_at, id) < ($4, $5))
            ORDER BY created_at DESC, id DESC
            LIMIT $6
            "#,
            ALERT_COLUMNS
        );
        let result = sqlx::query_as::<_, AlertEntity>(&sql)
            .bind(filter.device_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.alert_type.map(|t| t.as_str()))
            .bind(after.map(|c| c.created_at))
            .bind(after.map(|c| c.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }
}
