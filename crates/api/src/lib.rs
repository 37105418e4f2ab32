//! HTTP surface of the Fleet Tracker backend: configuration, axum router,
//! middleware, extractors, route handlers and background jobs.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod routes;
