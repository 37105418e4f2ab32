//! Shared utilities and common types for the Fleet Tracker backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Credential hashing and token generation
//! - Common validation logic (coordinates, serial numbers)
//! - Cursor pagination helpers

pub mod crypto;
pub mod pagination;
pub mod validation;
