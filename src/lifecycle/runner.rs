//! Loop side of a looper: carries out start/stop commands on a service.
//!
//! # Responsibilities
//! - Receive commands from the [`LoopHandle`]
//! - Start/stop the service and acknowledge with the resulting status
//! - Report a crash when a running service exits on its own
//! - Stop the service on shutdown

use std::future::Future;

use thiserror::Error;

use crate::lifecycle::looper::{LoopCommand, LoopHandle};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::status::LoopStatus;

/// Error starting or stopping a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no command configured")]
    NotConfigured,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stop: {0}")]
    Stop(#[source] std::io::Error),
}

/// A subsystem driven by a loop runner.
pub trait Service: Send + 'static {
    /// Start the service. Returns once it is up.
    fn start(&mut self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Stop the service. Returns once it is down.
    fn stop(&mut self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Resolves when the running service exits on its own, with a
    /// description of the exit.
    fn exited(&mut self) -> impl Future<Output = String> + Send;
}

/// Drive `service` from the commands of `handle` until every looper is
/// dropped or shutdown is signalled.
pub async fn run<S: Service>(
    mut handle: LoopHandle,
    mut service: S,
    mut shutdown: ShutdownSignal,
) {
    let mut running = false;
    tracing::debug!(loop_name = %handle.name(), "Loop runner started");

    loop {
        tokio::select! {
            command = handle.next_command() => match command {
                Some(LoopCommand::Start(ack)) => {
                    match service.start().await {
                        Ok(()) => {
                            running = true;
                            ack.send(LoopStatus::Running);
                        }
                        Err(e) => {
                            tracing::error!(loop_name = %handle.name(), error = %e, "Failed to start");
                            ack.send(LoopStatus::Crashed);
                        }
                    }
                }
                Some(LoopCommand::Stop(ack)) => {
                    if running {
                        if let Err(e) = service.stop().await {
                            tracing::warn!(loop_name = %handle.name(), error = %e, "Failed to stop cleanly");
                        }
                        running = false;
                    }
                    ack.send(LoopStatus::Stopped);
                }
                None => break,
            },
            exit = service.exited(), if running => {
                running = false;
                tracing::warn!(loop_name = %handle.name(), exit = %exit, "Exited unexpectedly");
                handle.report(LoopStatus::Crashed);
            }
            _ = shutdown.recv() => {
                tracing::info!(loop_name = %handle.name(), "Loop runner received shutdown signal");
                break;
            }
        }
    }

    if running {
        if let Err(e) = service.stop().await {
            tracing::warn!(loop_name = %handle.name(), error = %e, "Failed to stop cleanly");
        }
        handle.report(LoopStatus::Stopped);
    }
    tracing::debug!(loop_name = %handle.name(), "Loop runner exited");
}
