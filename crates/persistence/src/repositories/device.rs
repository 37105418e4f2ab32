//! Device repository.

use chrono::{DateTime, Utc};
use domain::models::{Connectivity, ManagementState, NewDevice, NewLocationSample};
use domain::store::DeviceAssignment;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{DeviceEntity, DEVICE_COLUMNS};
use crate::metrics::QueryTimer;

/// Lifecycle columns read under a row lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceLifecycleRow {
    pub active: bool,
    pub management: String,
}

impl DeviceLifecycleRow {
    pub fn accepts_checkin(&self) -> bool {
        self.active && self.management != ManagementState::Wiped.as_str()
    }
}

/// Outcome of a soft delete.
#[derive(Debug)]
pub enum Deactivation {
    Missing,
    CommandsInFlight,
    Done(DeviceEntity),
}

#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_id");
        let sql = format!("SELECT {} FROM devices WHERE id = $1", DEVICE_COLUMNS);
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn find_by_serial(
        &self,
        serial_number: &str,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_serial");
        let sql = format!("SELECT {} FROM devices WHERE serial_number = $1", DEVICE_COLUMNS);
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_token_hash");
        let sql = format!("SELECT {} FROM devices WHERE agent_token_hash = $1", DEVICE_COLUMNS);
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Inserts a freshly registered device: offline, unrestricted, active.
    pub async fn create(&self, device: &NewDevice) -> Result<DeviceEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_device");
        let sql = format!(
            r#"
            INSERT INTO devices (id, serial_number, hostname, agent_token_hash,
                                 connectivity, management, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(device.id)
            .bind(&device.serial_number)
            .bind(&device.hostname)
            .bind(&device.agent_token_hash)
            .bind(Connectivity::Offline.as_str())
            .bind(ManagementState::Unrestricted.as_str())
            .bind(device.created_at)
            .fetch_one(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn rotate_token(
        &self,
        id: Uuid,
        hostname: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("rotate_agent_token");
        let sql = format!(
            r#"
            UPDATE devices
            SET agent_token_hash = $2, hostname = $3, active = TRUE, updated_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(id)
            .bind(token_hash)
            .bind(hostname)
            .bind(now)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn list(
        &self,
        department: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_devices");
        let sql = format!(
            r#"
            SELECT {}
            FROM devices
            WHERE ($1::TEXT IS NULL OR department = $1)
              AND ($2 OR active)
            ORDER BY serial_number
            "#,
            DEVICE_COLUMNS
        );
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(department)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }

    pub async fn update_assignment(
        &self,
        id: Uuid,
        assignment: &DeviceAssignment,
        now: DateTime<Utc>,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_device_assignment");
        let sql = format!(
            r#"
            UPDATE devices
            SET asset_tag = $2, employee = $3, department = $4, updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            DEVICE_COLUMNS
        );
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(id)
            .bind(&assignment.asset_tag)
            .bind(&assignment.employee)
            .bind(&assignment.department)
            .bind(now)
            .fetch_optional(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Soft delete, refused while pending or sent commands exist.
    pub async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> Result<Deactivation, sqlx::Error> {
        let timer = QueryTimer::new("deactivate_device");
        let result: Result<Deactivation, sqlx::Error> = async {
            let mut tx = self.pool.begin().await?;
            if Self::lock_lifecycle(&mut *tx, id).await?.is_none() {
                return Ok(Deactivation::Missing);
            }
            let in_flight: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM commands
                    WHERE device_id = $1 AND status IN ('pending', 'sent')
                )
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if in_flight {
                return Ok(Deactivation::CommandsInFlight);
            }

            let sql = format!(
                "UPDATE devices SET active = FALSE, updated_at = $2 WHERE id = $1 RETURNING {}",
                DEVICE_COLUMNS
            );
            let device = sqlx::query_as::<_, DeviceEntity>(&sql)
                .bind(id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(Deactivation::Done(device))
        }
        .await;
        timer.finish(result)
    }

    pub async fn stale_online(&self, cutoff: DateTime<Utc>) -> Result<Vec<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("stale_online_devices");
        let sql = format!(
            r#"
            SELECT {}
            FROM devices
            WHERE active
              AND connectivity = 'online'
              AND last_seen_at < $1
            ORDER BY last_seen_at
            "#,
            DEVICE_COLUMNS
        );
        let result = sqlx::query_as::<_, DeviceEntity>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await;
        timer.finish(result)
    }

    /// Conditional write: a check-in that landed after the sweep read the
    /// device keeps it online.
    pub async fn mark_offline_if_stale(
        &self,
        id: Uuid,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("mark_offline_if_stale");
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET connectivity = 'offline', updated_at = $3
            WHERE id = $1 AND connectivity = 'online' AND last_seen_at < $2
            "#,
        )
        .bind(id)
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected() > 0);
        timer.finish(result)
    }

    /// Locks the device row for the rest of the transaction.
    pub async fn lock_lifecycle(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<DeviceLifecycleRow>, sqlx::Error> {
        sqlx::query_as::<_, DeviceLifecycleRow>(
            "SELECT active, management FROM devices WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Marks the device online and records its latest position.
    pub async fn record_checkin(
        conn: &mut PgConnection,
        sample: &NewLocationSample,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE devices
            SET connectivity = 'online',
                last_seen_at = $2,
                last_latitude = $3,
                last_longitude = $4,
                last_accuracy_meters = $5,
                last_location_source = $6,
                last_location_at = $7,
                battery_percent = COALESCE($8, battery_percent),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(sample.device_id)
        .bind(now)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.accuracy_meters)
        .bind(sample.source.as_str())
        .bind(sample.recorded_at)
        .bind(sample.battery_percent)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Applies a command's management effect. A wiped device stays wiped.
    pub async fn apply_management(
        conn: &mut PgConnection,
        id: Uuid,
        state: ManagementState,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE devices
            SET management = $2, updated_at = $3
            WHERE id = $1 AND management <> 'wiped'
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .bind(now)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_row_accepts_checkin() {
        let row = |active: bool, management: &str| DeviceLifecycleRow {
            active,
            management: management.to_string(),
        };
        assert!(row(true, "unrestricted").accepts_checkin());
        assert!(row(true, "locked").accepts_checkin());
        assert!(!row(true, "wiped").accepts_checkin());
        assert!(!row(false, "unrestricted").accepts_checkin());
    }
}
