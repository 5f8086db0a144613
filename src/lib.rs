//! Control plane of a VPN daemon: role-based HTTP authorization in front of
//! lifecycle loopers that start and stop the daemon's subsystems.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::DaemonConfig;
pub use http::ControlServer;
pub use lifecycle::Shutdown;
