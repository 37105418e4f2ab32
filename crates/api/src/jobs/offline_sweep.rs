//! Periodic offline sweep.

use domain::models::AlertType;
use domain::services::OfflineSweep;
use std::time::Duration;

use super::scheduler::{interval_from_secs, Job};
use crate::middleware::metrics;

/// Marks devices offline once they exceed the policy's offline threshold.
pub struct OfflineSweepJob {
    sweep: OfflineSweep,
    interval: Duration,
}

impl OfflineSweepJob {
    pub fn new(sweep: OfflineSweep, interval_secs: u64) -> Self {
        Self {
            sweep,
            interval: interval_from_secs(interval_secs),
        }
    }
}

#[async_trait::async_trait]
impl Job for OfflineSweepJob {
    fn name(&self) -> &'static str {
        "offline_sweep"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self.sweep.run().await.map_err(|e| e.to_string())?;
        for _ in 0..report.alerts_raised {
            metrics::record_alert_raised(AlertType::Offline);
        }
        if report.errors > 0 {
            return Err(format!(
                "{} of {} devices failed to sweep",
                report.errors, report.candidates
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{Connectivity, LocationSource, PolicySettings};
    use domain::models::device::RegisterAgentRequest;
    use domain::models::location::PingRequest;
    use domain::services::{FleetServices, ManualClock, RegistrationSettings, ServiceContext};
    use domain::store::memory::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_execute_marks_stale_device_offline() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let ctx = ServiceContext::new(Arc::new(MemoryStore::new()), Duration::from_secs(2))
            .with_clock(clock.clone());
        let services = FleetServices::new(
            ctx,
            RegistrationSettings {
                token_secret: "job-test-secret".into(),
                registration_code: None,
            },
        );
        services.policy.seed(PolicySettings::default()).await.unwrap();

        let device = services
            .registration
            .register(
                RegisterAgentRequest {
                    serial_number: "SN-SWEEPJOB".into(),
                    hostname: "host".into(),
                    registration_code: None,
                },
                None,
            )
            .await
            .unwrap()
            .device_id;
        services
            .checkin
            .checkin(
                device,
                PingRequest {
                    latitude: 1.0,
                    longitude: 1.0,
                    accuracy_meters: 5.0,
                    source: LocationSource::Gps,
                    ip_address: None,
                    wifi_ssid: None,
                    wifi_bssid: None,
                    battery_percent: None,
                },
            )
            .await
            .unwrap();

        let job = OfflineSweepJob::new(services.sweep.clone(), 60);
        assert_eq!(job.interval(), Duration::from_secs(60));

        job.execute().await.unwrap();
        assert_eq!(
            services.devices.get(device).await.unwrap().connectivity,
            Connectivity::Online
        );

        clock.advance(chrono::Duration::hours(25));
        job.execute().await.unwrap();
        assert_eq!(
            services.devices.get(device).await.unwrap().connectivity,
            Connectivity::Offline
        );
    }
}
