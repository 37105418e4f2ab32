//! PostgreSQL persistence for Fleet Tracker.
//!
//! This crate contains:
//! - Connection pool and migration helpers
//! - Entity definitions (database row mappings)
//! - Repositories that own the SQL
//! - [`PgStore`], the implementation of the domain storage ports

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use error::PersistenceError;
pub use store::PgStore;
