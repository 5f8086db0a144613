//! HTTP control server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, optional request logging)
//!     → [legacy fallback gate]
//!     → authorization middleware (crate::auth)
//!     → handlers.rs (loopers, daemon info)
//!     → JSON response
//! ```

pub mod handlers;
pub mod info;
pub mod server;

pub use info::{DaemonInfo, PublicIp};
pub use server::{ControlServer, Loopers};
