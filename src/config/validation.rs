//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Listening address and privileged port checks
//! - Authorization settings consistency
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Runs before the config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::schema::{ControlServerConfig, DaemonConfig};

const MAX_PRIVILEGED_PORT: u16 = 1023;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listening address is not valid: {address:?}: {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("cannot use privileged port without running as root: {port} when running with user ID {uid}")]
    PrivilegedPort { port: u16, uid: u32 },

    #[error("metrics address is not valid: {0:?}")]
    InvalidMetricsAddress(String),

    #[error("log level {0:?} is not one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("authorization settings: {0}")]
    Auth(#[from] AuthError),
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.control_server.bind_address() {
        Ok((_, port)) => {
            if let Err(e) = check_port(port, current_uid()) {
                errors.push(e);
            }
        }
        Err(e) => errors.push(e),
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.metrics.address.clone(),
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.logging.level.clone()));
    }

    if let Some(auth) = &config.auth {
        if let Err(e) = auth.validate() {
            errors.push(e.into());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl ControlServerConfig {
    /// Address to bind, with an empty host meaning every interface, and the
    /// parsed port.
    pub fn bind_address(&self) -> Result<(String, u16), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidListenAddress {
            address: self.address.clone(),
            reason: reason.to_string(),
        };

        let (host, port) = self
            .address
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let port: u16 = port.parse().map_err(|_| invalid("port is not valid"))?;
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            return Err(invalid("IPv6 hosts must be enclosed in brackets"));
        }

        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok((format!("{}:{}", host, port), port))
    }
}

/// Ports up to 1023 need root, except port 0 which picks a free one.
fn check_port(port: u16, uid: u32) -> Result<(), ValidationError> {
    if uid != 0 && port != 0 && port <= MAX_PRIVILEGED_PORT {
        return Err(ValidationError::PrivilegedPort { port, uid });
    }
    Ok(())
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}
