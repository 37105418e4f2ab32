//! Custom Axum extractors.

pub mod admin;
pub mod agent;
pub mod client_ip;

pub use admin::AdminAuth;
pub use agent::AgentAuth;
pub use client_ip::ClientIp;
