//! VPN daemon control server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────────▶ request id ─▶ [fallback gate] ─▶ authorization ─▶ handlers
//!                                                                            │
//!                                                                            ▼
//!                                     loop runner ◀── command + ack ──── looper
//!                                          │
//!                                          ▼
//!                                   supervised process (vpn, dns, updater)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vpn_control::config::{load_or_default, ServiceConfig};
use vpn_control::http::{ControlServer, DaemonInfo, Loopers};
use vpn_control::lifecycle::{runner, signals, LoopStatus, Looper, ProcessService, Shutdown};
use vpn_control::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "vpn-control", version, about = "VPN daemon control server")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "VPN_CONTROL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vpn-control starting");

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let services = &config.services;
    let (vpn, vpn_runner) = spawn_loop("vpn", &services.vpn, &shutdown);
    let (dns, dns_runner) = spawn_loop("dns", &services.dns, &shutdown);
    let (updater, updater_runner) = spawn_loop("updater", &services.updater, &shutdown);
    let loopers = Loopers { vpn, dns, updater };

    // Written by the port forwarding and public IP collaborators, which are
    // not part of this binary; the API serves the defaults until then.
    let info = DaemonInfo::new();
    let server = ControlServer::new(&config, loopers.clone(), info)?;

    let (bind_address, _) = config.control_server.bind_address()?;
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for control requests");

    for (looper, service) in [
        (&loopers.vpn, &services.vpn),
        (&loopers.dns, &services.dns),
        (&loopers.updater, &services.updater),
    ] {
        if service.autostart {
            autostart(looper.clone());
        }
    }

    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::terminate().await;
    shutdown.trigger();

    server_task.await??;
    for runner in [vpn_runner, dns_runner, updater_runner] {
        runner.await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_loop(name: &str, config: &ServiceConfig, shutdown: &Shutdown) -> (Looper, JoinHandle<()>) {
    let (looper, handle) = Looper::new(name);
    let service = ProcessService::new(name, config.command.clone());
    let runner = tokio::spawn(runner::run(handle, service, shutdown.subscribe()));
    (looper, runner)
}

fn autostart(looper: Looper) {
    tokio::spawn(async move {
        match looper
            .set_status(LoopStatus::Running, &CancellationToken::new())
            .await
        {
            Ok(outcome) => {
                tracing::info!(loop_name = %looper.name(), outcome = %outcome, "Autostarted")
            }
            Err(e) => tracing::error!(loop_name = %looper.name(), error = %e, "Autostart failed"),
        }
    });
}
