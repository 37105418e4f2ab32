//! Location sample repository.

use domain::models::NewLocationSample;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::LocationSampleEntity;
use crate::metrics::QueryTimer;

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent samples first.
    pub async fn recent(
        &self,
        device_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LocationSampleEntity>, sqlx::Error> {
        let timer = QueryTimer::new("recent_location_samples");
        let result = sqlx::query_as::<_, LocationSampleEntity>(
            r#"
            SELECT id, device_id, latitude, longitude, accuracy_meters, source,
                   ip_address, wifi_ssid, wifi_bssid, battery_percent, recorded_at
            FROM location_samples
            WHERE device_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    pub async fn insert(conn: &mut PgConnection, sample: &NewLocationSample) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO location_samples (device_id, latitude, longitude, accuracy_meters, source,
                                          ip_address, wifi_ssid, wifi_bssid, battery_percent,
                                          recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(sample.device_id)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.accuracy_meters)
        .bind(sample.source.as_str())
        .bind(&sample.ip_address)
        .bind(&sample.wifi_ssid)
        .bind(&sample.wifi_bssid)
        .bind(sample.battery_percent)
        .bind(sample.recorded_at)
        .fetch_one(conn)
        .await
    }
}
