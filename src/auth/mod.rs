//! Control server authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Settings (auths + roles, from config)
//!     → settings.rs (validate, resolve role checkers)
//!     → table.rs (compile Route → [(role, checker)])
//!     → middleware.rs (immutable Authorizer shared via Arc)
//!
//! Per request:
//!     (method, path) → route.rs key
//!     → table lookup (absent ⇒ 401)
//!     → checker.rs is tried in role order (first grant ⇒ forward)
//!     → otherwise a single 401, with Basic challenge if relevant
//! ```
//!
//! # Design Decisions
//! - Only routes from a fixed allow-list can be declared
//! - An undeclared route is never reachable, whatever the credentials
//! - Checkers never write to the response; the denial is written once
//! - Secrets are compared in constant time

pub mod checker;
pub mod fallback;
pub mod middleware;
pub mod route;
pub mod settings;
pub mod table;

pub use checker::Checker;
pub use fallback::FallbackGate;
pub use middleware::{Authorizer, Decision};
pub use route::Route;
pub use settings::{Auth, AuthError, Role, Settings};
pub use table::RouteTable;
