//! Shared fixtures for service tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::{Actor, FleetServices, ManualClock, RegistrationSettings, ServiceContext};
use crate::models::command::CommandResultRequest;
use crate::models::device::RegisterAgentRequest;
use crate::models::location::PingRequest;
use crate::models::{CommandOutcome, CommandType, LocationSource, PolicySettings};
use crate::store::memory::MemoryStore;

pub const ADMIN_KEY: &str = "ft_testkey1abcdefghijklmnopqrstuvwxyz";

pub fn ping(latitude: f64, longitude: f64) -> PingRequest {
    PingRequest {
        latitude,
        longitude,
        accuracy_meters: 10.0,
        source: LocationSource::Gps,
        ip_address: None,
        wifi_ssid: None,
        wifi_bssid: None,
        battery_percent: Some(80),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub services: FleetServices,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(PolicySettings::default(), None).await
    }

    pub async fn with_policy(settings: PolicySettings) -> Self {
        Self::build(settings, None).await
    }

    pub async fn with_registration_code(code: &str) -> Self {
        Self::build(PolicySettings::default(), Some(code.to_string())).await
    }

    async fn build(settings: PolicySettings, registration_code: Option<String>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ctx = ServiceContext::new(store.clone(), Duration::from_secs(2)).with_clock(clock.clone());
        let services = FleetServices::new(
            ctx,
            RegistrationSettings {
                token_secret: "test-secret".into(),
                registration_code,
            },
        );
        services.policy.seed(settings).await.unwrap();
        services
            .registration
            .ensure_admin_key(ADMIN_KEY, "tests")
            .await
            .unwrap();
        Self {
            store,
            clock,
            services,
        }
    }

    pub fn admin(&self) -> Actor {
        Actor::admin(&ADMIN_KEY[3..11])
    }

    pub async fn register(&self, serial: &str) -> Uuid {
        self.services
            .registration
            .register(
                RegisterAgentRequest {
                    serial_number: serial.to_string(),
                    hostname: format!("host-{}", serial.to_lowercase()),
                    registration_code: None,
                },
                None,
            )
            .await
            .unwrap()
            .device_id
    }

    /// Runs a management command through enqueue, delivery and execution.
    async fn execute(&self, device: Uuid, command_type: CommandType) {
        let queued = self
            .services
            .commands
            .enqueue(&self.admin(), device, command_type, None)
            .await
            .unwrap();
        let delivered = self
            .services
            .checkin
            .checkin(device, ping(1.0, 1.0))
            .await
            .unwrap();
        assert_eq!(delivered.command.map(|c| c.id), Some(queued.command.id));
        self.services
            .results
            .report_result(
                device,
                queued.command.id,
                CommandResultRequest {
                    outcome: CommandOutcome::Executed,
                    result: None,
                    error: None,
                },
            )
            .await
            .unwrap();
    }

    pub async fn lock(&self, device: Uuid) {
        self.execute(device, CommandType::Lock).await;
    }

    pub async fn wipe(&self, device: Uuid) {
        self.execute(device, CommandType::Wipe).await;
    }
}
