//! Connection loop status.
//!
//! # State Transitions
//! ```text
//! Stopped → Starting → Running | Crashed   (start acknowledged)
//! Running → Stopping → Stopped             (stop acknowledged)
//! Running → Crashed                        (loop reports an unexpected exit)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of one managed connection loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Stopped => "stopped",
            LoopStatus::Starting => "starting",
            LoopStatus::Running => "running",
            LoopStatus::Stopping => "stopping",
            LoopStatus::Crashed => "crashed",
        }
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown loop status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for LoopStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stopped" => Ok(LoopStatus::Stopped),
            "starting" => Ok(LoopStatus::Starting),
            "running" => Ok(LoopStatus::Running),
            "stopping" => Ok(LoopStatus::Stopping),
            "crashed" => Ok(LoopStatus::Crashed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form() {
        assert_eq!(LoopStatus::Running.to_string(), "running");
        assert_eq!("Stopped".parse::<LoopStatus>(), Ok(LoopStatus::Stopped));
        assert_eq!(
            "paused".parse::<LoopStatus>(),
            Err(UnknownStatus("paused".to_string()))
        );
        assert_eq!(LoopStatus::default(), LoopStatus::Stopped);
    }

    #[test]
    fn json_form() {
        let json = serde_json::to_string(&LoopStatus::Crashed).unwrap();
        assert_eq!(json, "\"crashed\"");
        let status: LoopStatus = serde_json::from_str("\"stopping\"").unwrap();
        assert_eq!(status, LoopStatus::Stopping);
    }
}
