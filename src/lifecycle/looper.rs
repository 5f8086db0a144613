//! Lifecycle coordinator for one connection loop.
//!
//! # Responsibilities
//! - Own the loop's shared status
//! - Serialize start/stop transitions against the loop
//! - Let status reads proceed while a transition is in flight
//!
//! # Design Decisions
//! - Status sits behind a read/write lock, held only to read or publish
//! - A separate transition lock is held for a whole start/stop attempt
//! - The intermediate status (`starting`/`stopping`) is published before the
//!   attempt begins, so concurrent callers short-circuit instead of queueing
//! - Each attempt runs on its own task: a caller that cancels (or is dropped)
//!   stops waiting but the loop's acknowledgment still publishes the final
//!   status. Readers can therefore see `starting`/`stopping` for longer than
//!   a cancelled caller waited; that is expected, not a stuck loop.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::status::LoopStatus;
use crate::observability::metrics;

/// Errors returned by [`Looper::set_status`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The requested target is not a status callers may ask for.
    #[error("invalid status: {0}: it can only be one of: running, stopped")]
    InvalidStatus(LoopStatus),

    /// The transition task panicked or was cancelled by the runtime.
    #[error("transition of loop {name} aborted: {source}")]
    TransitionAborted {
        name: String,
        #[source]
        source: JoinError,
    },
}

/// Result of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was done, the loop already was in this status.
    Already(LoopStatus),
    /// The loop acknowledged the transition with this status.
    Reached(LoopStatus),
    /// The caller stopped waiting; the transition continues in the background.
    Pending(LoopStatus),
}

impl Outcome {
    pub fn status(&self) -> LoopStatus {
        match self {
            Outcome::Already(s) | Outcome::Reached(s) | Outcome::Pending(s) => *s,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Already(status) => write!(f, "already {}", status),
            Outcome::Reached(status) | Outcome::Pending(status) => write!(f, "{}", status),
        }
    }
}

/// Acknowledgment the loop sends back once a command is carried out.
#[derive(Debug)]
pub struct Ack {
    shared: Arc<Shared>,
    /// Status a stop always settles on, whatever the loop sends.
    settles: Option<LoopStatus>,
    tx: oneshot::Sender<LoopStatus>,
}

impl Ack {
    /// Publishes the resulting status, then wakes the requester, which may
    /// be gone already. Publishing here keeps the acknowledgment ordered
    /// with any later [`LoopHandle::report`] from the same loop.
    pub fn send(self, status: LoopStatus) {
        let status = self.settles.unwrap_or(status);
        self.shared.publish(status);
        metrics::record_loop_transition(&self.shared.name, status);
        let _ = self.tx.send(status);
    }
}

/// Command sent to the loop.
#[derive(Debug)]
pub enum LoopCommand {
    /// Start; acknowledge with `Running` or `Crashed`.
    Start(Ack),
    /// Stop; acknowledge once stopped.
    Stop(Ack),
}

#[derive(Debug)]
struct Shared {
    name: String,
    status: RwLock<LoopStatus>,
    /// Held for the duration of a start/stop attempt.
    transition: Mutex<()>,
}

impl Shared {
    fn publish(&self, status: LoopStatus) {
        *self.status.write() = status;
        tracing::debug!(loop_name = %self.name, status = %status, "Loop status updated");
    }
}

/// Control side of a connection loop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Looper {
    shared: Arc<Shared>,
    commands: mpsc::Sender<LoopCommand>,
}

/// Loop side: receives commands and reports status changes.
#[derive(Debug)]
pub struct LoopHandle {
    shared: Arc<Shared>,
    commands: mpsc::Receiver<LoopCommand>,
}

impl Looper {
    /// Create a looper in the `Stopped` status.
    ///
    /// Returns the looper and the handle the loop must drive.
    pub fn new(name: impl Into<String>) -> (Self, LoopHandle) {
        let shared = Arc::new(Shared {
            name: name.into(),
            status: RwLock::new(LoopStatus::Stopped),
            transition: Mutex::new(()),
        });
        let (tx, rx) = mpsc::channel(1);

        (
            Self {
                shared: shared.clone(),
                commands: tx,
            },
            LoopHandle {
                shared,
                commands: rx,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current status. Never waits on an in-flight transition.
    pub fn status(&self) -> LoopStatus {
        *self.shared.status.read()
    }

    /// Request the loop to reach `target`, which must be `Running` or
    /// `Stopped`.
    ///
    /// Returns `Outcome::Already` without signalling the loop if it is
    /// already in, or moving through, another status. Otherwise waits for the
    /// loop's acknowledgment or for `cancel`, whichever comes first.
    pub async fn set_status(
        &self,
        target: LoopStatus,
        cancel: &CancellationToken,
    ) -> Result<Outcome, LifecycleError> {
        let (from, pending) = match target {
            LoopStatus::Running => (LoopStatus::Stopped, LoopStatus::Starting),
            LoopStatus::Stopped => (LoopStatus::Running, LoopStatus::Stopping),
            other => return Err(LifecycleError::InvalidStatus(other)),
        };

        if let Err(current) = self.claim(from, pending) {
            return Ok(Outcome::Already(current));
        }
        self.drive(target, pending, cancel).await
    }

    /// Stop then start the loop. A pending stop is returned as is.
    ///
    /// A crashed loop is sent a stop regardless, so the restart brings it
    /// back up.
    pub async fn restart(&self, cancel: &CancellationToken) -> Result<Outcome, LifecycleError> {
        let stopped = if self.claim(LoopStatus::Crashed, LoopStatus::Stopping).is_ok() {
            tracing::info!(loop_name = %self.shared.name, "Restarting crashed loop");
            self.drive(LoopStatus::Stopped, LoopStatus::Stopping, cancel)
                .await?
        } else {
            self.set_status(LoopStatus::Stopped, cancel).await?
        };
        if let Outcome::Pending(_) = stopped {
            return Ok(stopped);
        }
        self.set_status(LoopStatus::Running, cancel).await
    }

    /// Moves `from` to `pending` under the write lock, or returns the
    /// current status untouched.
    fn claim(&self, from: LoopStatus, pending: LoopStatus) -> Result<(), LoopStatus> {
        let mut status = self.shared.status.write();
        if *status != from {
            return Err(*status);
        }
        *status = pending;
        Ok(())
    }

    async fn drive(
        &self,
        target: LoopStatus,
        pending: LoopStatus,
        cancel: &CancellationToken,
    ) -> Result<Outcome, LifecycleError> {
        tracing::info!(loop_name = %self.shared.name, status = %pending, "Loop transition requested");

        let transition = tokio::spawn(self.clone().transition(target));
        tokio::select! {
            result = transition => {
                let status = result.map_err(|source| LifecycleError::TransitionAborted {
                    name: self.shared.name.clone(),
                    source,
                })?;
                Ok(Outcome::Reached(status))
            }
            _ = cancel.cancelled() => {
                tracing::debug!(
                    loop_name = %self.shared.name,
                    status = %pending,
                    "Caller stopped waiting, transition continues in background"
                );
                Ok(Outcome::Pending(pending))
            }
        }
    }

    async fn transition(self, target: LoopStatus) -> LoopStatus {
        let _transition = self.shared.transition.lock().await;

        let (tx, rx) = oneshot::channel();
        let ack = |settles| Ack {
            shared: self.shared.clone(),
            settles,
            tx,
        };
        let command = match target {
            LoopStatus::Running => LoopCommand::Start(ack(None)),
            _ => LoopCommand::Stop(ack(Some(LoopStatus::Stopped))),
        };

        // The acknowledgment publishes the status itself.
        let status = if self.commands.send(command).await.is_err() {
            tracing::warn!(loop_name = %self.shared.name, "Loop is not running, command dropped");
            self.publish_unreachable(target)
        } else {
            match rx.await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(
                        loop_name = %self.shared.name,
                        "Loop exited without acknowledging command"
                    );
                    self.publish_unreachable(target)
                }
            }
        };

        tracing::info!(loop_name = %self.shared.name, status = %status, "Loop transition complete");
        status
    }

    fn publish_unreachable(&self, target: LoopStatus) -> LoopStatus {
        let status = unreachable_loop_status(target);
        self.shared.publish(status);
        metrics::record_loop_transition(&self.shared.name, status);
        status
    }
}

/// Status to publish when the loop cannot be reached.
fn unreachable_loop_status(target: LoopStatus) -> LoopStatus {
    match target {
        LoopStatus::Running => LoopStatus::Crashed,
        _ => LoopStatus::Stopped,
    }
}

impl LoopHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Next command, or `None` once every looper clone is dropped.
    pub async fn next_command(&mut self) -> Option<LoopCommand> {
        self.commands.recv().await
    }

    pub fn status(&self) -> LoopStatus {
        *self.shared.status.read()
    }

    /// Publish a status change the loop made on its own, such as a crash.
    pub fn report(&self, status: LoopStatus) {
        self.shared.publish(status);
        metrics::record_loop_transition(&self.shared.name, status);
    }
}
