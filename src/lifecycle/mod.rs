//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Control request (PUT .../status):
//!     looper.rs set_status
//!     → publish starting/stopping
//!     → transition task: command + one-shot ack → runner.rs
//!     → runner drives the Service (process.rs) → ack
//!     → publish running/crashed/stopped
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!     → server stops accepting, runners stop their services
//! ```
//!
//! # Design Decisions
//! - One looper per managed loop, status readable without waiting
//! - At most one transition drives a loop at a time
//! - Cancelling a caller never aborts the loop's own transition

pub mod looper;
pub mod process;
pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod status;

pub use looper::{LifecycleError, LoopCommand, LoopHandle, Looper, Outcome};
pub use process::ProcessService;
pub use runner::{Service, ServiceError};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use status::LoopStatus;
