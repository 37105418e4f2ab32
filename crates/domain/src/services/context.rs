//! Shared plumbing for the services: store handle, device locks, clock and
//! the bound on every store call.

use chrono::{DateTime, SubsecRound, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::device_locks::DeviceLocks;
use crate::error::{DomainError, DomainResult};
use crate::store::TrackingStore;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to microseconds to match database precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(6)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at.trunc_subsecs(6);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a service needs besides its collaborators.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn TrackingStore>,
    pub locks: DeviceLocks,
    pub clock: Arc<dyn Clock>,
    pub store_timeout: Duration,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn TrackingStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            locks: DeviceLocks::new(),
            clock: Arc::new(SystemClock),
            store_timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs a store call under the configured timeout.
    pub async fn bounded<T, F>(&self, op: &'static str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.store_timeout.as_millis() as u64, "Store call timed out");
                Err(DomainError::Timeout(format!("{} timed out", op)))
            }
        }
    }

    pub async fn lock_device(&self, device_id: Uuid) -> DomainResult<OwnedMutexGuard<()>> {
        self.locks.acquire(device_id, self.store_timeout).await
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
