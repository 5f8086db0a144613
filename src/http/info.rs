//! Daemon facts published to the control server by other subsystems.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Public IP data as last resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIp {
    pub public_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Lock-free view of the forwarded port and the public IP. Cloning shares
/// the same values.
///
/// This crate only reads these values. The port forwarding client and the
/// public IP resolver run outside of it and publish through a clone handed
/// out by the embedding daemon (see `main.rs`). Until they do, the handlers
/// serve port 0 and an empty IP.
#[derive(Debug, Clone, Default)]
pub struct DaemonInfo {
    public_ip: Arc<ArcSwap<PublicIp>>,
    port_forwarded: Arc<AtomicU16>,
}

impl DaemonInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public_ip(&self) -> Arc<PublicIp> {
        self.public_ip.load_full()
    }

    pub fn set_public_ip(&self, data: PublicIp) {
        tracing::info!(public_ip = %data.public_ip, "Public IP updated");
        self.public_ip.store(Arc::new(data));
    }

    /// Forwarded port, 0 when none.
    pub fn port_forwarded(&self) -> u16 {
        self.port_forwarded.load(Ordering::Relaxed)
    }

    pub fn set_port_forwarded(&self, port: u16) {
        self.port_forwarded.store(port, Ordering::Relaxed);
    }
}
