//! Legacy single-credential gate.
//!
//! Before role-based authorization existed, one Basic-Auth pair from the
//! control server settings protected every route. It still applies when no
//! authorization settings are configured.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::auth::checker::Checker;
use crate::auth::middleware::unauthorized;
use crate::observability::metrics;

/// Global Basic-Auth gate for the whole control server.
#[derive(Debug, Clone)]
pub struct FallbackGate {
    checker: Checker,
}

impl FallbackGate {
    /// Returns `None` when the username or the password is empty, which
    /// disables the gate.
    pub fn new(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            checker: Checker::basic(username, password),
        })
    }

    pub fn wrap<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(Arc::new(self), gate))
    }
}

async fn gate(
    State(gate): State<Arc<FallbackGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if gate.checker.is_authorized(request.headers()) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Fallback credentials missing or invalid");
    metrics::record_auth_decision(false);
    unauthorized(gate.checker.challenge())
}
