//! Shared utilities for control server integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use vpn_control::config::DaemonConfig;
use vpn_control::http::{ControlServer, DaemonInfo, Loopers};
use vpn_control::lifecycle::{LoopCommand, LoopHandle, LoopStatus, Looper, Shutdown};

/// A control server on an ephemeral port, driving fake loops.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub loopers: Loopers,
    pub info: DaemonInfo,
    pub shutdown: Shutdown,
    /// Each start of the VPN loop waits for one notification when set.
    pub vpn_gate: Arc<Notify>,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server from a TOML configuration. The VPN loop only acknowledges
/// starts once `vpn_gate` is notified when `gated` is true.
pub async fn start_server(config_toml: &str, gated: bool) -> TestServer {
    let config: DaemonConfig = toml::from_str(config_toml).unwrap();

    let vpn_gate = Arc::new(Notify::new());
    let (vpn, handle) = Looper::new("vpn");
    spawn_fake_loop(handle, gated.then(|| vpn_gate.clone()));
    let (dns, handle) = Looper::new("dns");
    spawn_fake_loop(handle, None);
    let (updater, handle) = Looper::new("updater");
    spawn_fake_loop(handle, None);
    let loopers = Loopers { vpn, dns, updater };

    let info = DaemonInfo::new();
    let server = ControlServer::new(&config, loopers.clone(), info.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        loopers,
        info,
        shutdown,
        vpn_gate,
        task,
    }
}

/// Loop side that acknowledges every command, optionally holding starts.
fn spawn_fake_loop(mut handle: LoopHandle, gate: Option<Arc<Notify>>) {
    tokio::spawn(async move {
        while let Some(command) = handle.next_command().await {
            match command {
                LoopCommand::Start(ack) => {
                    if let Some(gate) = &gate {
                        gate.notified().await;
                    }
                    ack.send(LoopStatus::Running);
                }
                LoopCommand::Stop(ack) => ack.send(LoopStatus::Stopped),
            }
        }
    });
}
