//! Admin API key model.
//!
//! Keys are issued out of band; only their SHA-256 hash and display prefix
//! are stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored admin credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiKey {
    pub id: i64,
    #[serde(skip_serializing)]
    pub key_hash: String,
    /// First characters after the type prefix, used for identification.
    pub key_prefix: String,
    pub name: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Active and not expired at `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > at)
    }
}

/// Key about to be stored (bootstrap seeding).
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}
