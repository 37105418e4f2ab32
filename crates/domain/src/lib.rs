//! Domain layer for the Fleet Tracker backend.
//!
//! This crate contains:
//! - Domain models (Device, Command, Geofence, Alert, FleetPolicy, AuditLogEntry)
//! - Storage ports and an in-memory store
//! - Business logic services
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::{DomainError, DomainResult};
