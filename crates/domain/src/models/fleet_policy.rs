//! Fleet-wide policy owned by the server.
//!
//! Every update produces a new version; older versions are kept as history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::alert::Severity;

/// Tunable policy values, without version bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub offline_threshold_secs: i64,
    pub alert_debounce_secs: i64,
    pub remote_wipe_enabled: bool,
    pub screenshot_enabled: bool,
    pub offline_alert_severity: Severity,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            offline_threshold_secs: 24 * 60 * 60,
            alert_debounce_secs: 300,
            remote_wipe_enabled: true,
            screenshot_enabled: true,
            offline_alert_severity: Severity::Medium,
        }
    }
}

/// One version of the fleet policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetPolicy {
    pub version: i32,
    #[serde(flatten)]
    pub settings: PolicySettings,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl FleetPolicy {
    /// Version 1 seeded from configuration.
    pub fn initial(settings: PolicySettings, now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            settings,
            updated_by: None,
            updated_at: now,
        }
    }

    pub fn offline_threshold(&self) -> Duration {
        Duration::seconds(self.settings.offline_threshold_secs)
    }

    pub fn alert_debounce(&self) -> Duration {
        Duration::seconds(self.settings.alert_debounce_secs)
    }
}

/// PUT /admin/policy
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePolicyRequest {
    /// Version the caller last read.
    pub expected_version: i32,

    #[validate(range(min = 60, max = 2592000, message = "Offline threshold must be between 60 seconds and 30 days"))]
    pub offline_threshold_secs: Option<i64>,

    #[validate(range(min = 0, max = 86400, message = "Alert debounce must be between 0 and 86400 seconds"))]
    pub alert_debounce_secs: Option<i64>,

    pub remote_wipe_enabled: Option<bool>,

    pub screenshot_enabled: Option<bool>,

    pub offline_alert_severity: Option<Severity>,
}

impl UpdatePolicyRequest {
    /// Builds the next version on top of `current`.
    pub fn next_version(
        &self,
        current: &FleetPolicy,
        updated_by: Option<String>,
        now: DateTime<Utc>,
    ) -> FleetPolicy {
        let mut settings = current.settings.clone();
        if let Some(v) = self.offline_threshold_secs {
            settings.offline_threshold_secs = v;
        }
        if let Some(v) = self.alert_debounce_secs {
            settings.alert_debounce_secs = v;
        }
        if let Some(v) = self.remote_wipe_enabled {
            settings.remote_wipe_enabled = v;
        }
        if let Some(v) = self.screenshot_enabled {
            settings.screenshot_enabled = v;
        }
        if let Some(v) = self.offline_alert_severity {
            settings.offline_alert_severity = v;
        }
        FleetPolicy {
            version: current.version + 1,
            settings,
            updated_by,
            updated_at: now,
        }
    }
}
