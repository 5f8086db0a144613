//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file. Every section has defaults so a minimal (or missing) file works.

use serde::{Deserialize, Serialize};

use crate::auth::Settings as AuthSettings;

/// Root configuration of the daemon.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// HTTP control server settings.
    pub control_server: ControlServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,

    /// Managed subsystems.
    pub services: ServicesConfig,

    /// Role-based authorization. When absent, legacy public defaults apply
    /// and the control server credentials gate every route.
    pub auth: Option<AuthSettings>,
}

impl DaemonConfig {
    /// Authorization settings in effect.
    pub fn auth_settings(&self) -> AuthSettings {
        self.auth.clone().unwrap_or_else(AuthSettings::legacy_public)
    }
}

/// Control server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlServerConfig {
    /// Listening address, `host:port` or `:port` for all interfaces.
    pub address: String,

    /// Log every request.
    pub log: bool,

    /// Legacy Basic-Auth username for the whole server.
    pub username: String,

    /// Legacy Basic-Auth password for the whole server.
    pub password: String,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self {
            address: ":8000".to_string(),
            log: true,
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Exporter bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Subsystems driven through the control server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    pub vpn: ServiceConfig,
    pub dns: ServiceConfig,
    pub updater: ServiceConfig,
}

/// One supervised subsystem.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Program and arguments. Empty means the subsystem cannot start.
    pub command: Vec<String>,

    /// Start the subsystem when the daemon starts.
    pub autostart: bool,
}
