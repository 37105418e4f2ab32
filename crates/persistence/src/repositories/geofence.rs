//! Geofence and membership repository.

use domain::models::{Geofence, GeofenceMembership};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{GeofenceEntity, GeofenceMembershipEntity, GEOFENCE_COLUMNS};
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct GeofenceRepository {
    pool: PgPool,
}

impl GeofenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, fence: &Geofence, shape: JsonValue) -> Result<GeofenceEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_geofence");
        let sql = format!(
            r#"
            INSERT INTO geofences (id, name, shape, active, department, alert_on_enter,
                                   alert_on_exit, alert_severity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            GEOFENCE_COLUMNS
        );
        let result = sqlx::query_as::<_, GeofenceEntity>(&sql)
            .bind(fence.id)
            .bind(&fence.name)
            .bind(shape)
            .bind(fence.active)
            .bind(&fence.department)
            .bind(fence.alert_on_enter)
            .bind(fence.alert_on_exit)
            .bind(fence.alert_severity.as_str())
            .bind(fence.created_at)
            .bind(fence.updated_at)
            .fetch_one(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Overwrites the fence; optionally drops its memberships in the same
    /// transaction.
    pub async fn update(
        &self,
        fence: &Geofence,
        shape: JsonValue,
        reset_memberships: bool,
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_geofence");
        let result: Result<Option<GeofenceEntity>, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            let sql = format!(
                r#"
                UPDATE geofences
                SET name = $2, shape = $3, active = $4, department = $5, alert_on_enter = $6,
                    alert_on_exit = $7, alert_severity = $8, updated_at = $9
                WHERE id = $1
                RETURNING {}
                "#,
                GEOFENCE_COLUMNS
            );
            let updated = sqlx::query_as::<_, GeofenceEntity>(&sql)
                .bind(fence.id)
                .bind(&fence.name)
                .bind(shape)
                .bind(fence.active)
                .bind(&fence.department)
                .bind(fence.alert_on_enter)
                .bind(fence.alert_on_exit)
                .bind(fence.alert_severity.as_str())
                .bind(fence.updated_at)
                .fetch_optional(&mut *tx)
                .await?;
            if updated.is_none() {
                return Ok(None);
            }
            if reset_memberships {
                sqlx::query("DELETE FROM geofence_memberships WHERE geofence_id = $1")
                    .bind(fence.id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(updated)
        }
        .await;
        timer.finish(result)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofence_by_id");
        let sql = format!("SELECT {} FROM geofences WHERE id = $1", GEOFENCE_COLUMNS);
        let result = sqlx::query_as::<_, GeofenceEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_geofences");
        let sql = format!(
            "SELECT {} FROM geofences WHERE $1 OR active ORDER BY name, id",
            GEOFENCE_COLUMNS
        );
        let result = sqlx::query_as::<_, GeofenceEntity>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn memberships(
        &self,
        device_id: Uuid,
    ) -> Result<Vec<GeofenceMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_geofence_memberships");
        let result = sqlx::query_as::<_, GeofenceMembershipEntity>(
            r#"
            SELECT device_id, geofence_id, inside, updated_at
            FROM geofence_memberships
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    pub async fn upsert_membership(
        conn: &mut PgConnection,
        membership: &GeofenceMembership,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO geofence_memberships (device_id, geofence_id, inside, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_id, geofence_id)
            DO UPDATE SET inside = EXCLUDED.inside, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(membership.device_id)
        .bind(membership.geofence_id)
        .bind(membership.inside)
        .bind(membership.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
