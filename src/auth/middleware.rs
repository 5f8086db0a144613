//! Role-based authorization middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use dashmap::DashSet;

use crate::auth::checker::Checker;
use crate::auth::route::Route;
use crate::auth::settings::{AuthError, Settings};
use crate::auth::table::RouteTable;
use crate::observability::metrics;

/// Outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Access granted by the named role.
    Granted { role: String },
    /// Access denied, with the challenge to send back if any.
    Denied { challenge: Option<HeaderValue> },
}

/// Authorizes control server requests against the compiled route table.
#[derive(Debug)]
pub struct Authorizer {
    table: RouteTable,
    /// Legacy public routes already warned about.
    warned: DashSet<Route>,
}

impl Authorizer {
    /// Compiles the settings. Fails if they are invalid, in which case the
    /// control server must not start.
    pub fn new(settings: &Settings) -> Result<Self, AuthError> {
        let table = RouteTable::compile(settings)?;
        tracing::debug!(
            routes = table.len(),
            auths = ?settings.auth_names(),
            roles = ?settings.role_names(),
            "Authorization table compiled"
        );
        Ok(Self {
            table,
            warned: DashSet::new(),
        })
    }

    /// Wraps every route and the fallback of the router.
    pub fn wrap<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(Arc::new(self), authorize))
    }

    /// Decides whether the request may reach the route.
    pub fn check(&self, route: &Route, headers: &HeaderMap) -> Decision {
        let Some(roles) = self.table.get(route) else {
            tracing::debug!(route = %route, "No authentication role defined for route");
            return Decision::Denied { challenge: None };
        };

        // Checkers only read headers, so trying every role leaves the
        // response untouched until the final decision.
        let mut challenge = None;
        for role in roles {
            if role.checker.is_authorized(headers) {
                if role.checker == Checker::None && route.is_legacy_public() {
                    self.warn_legacy_public(route);
                }
                tracing::debug!(route = %route, role = %role.role, "Access authorized");
                return Decision::Granted {
                    role: role.role.clone(),
                };
            }
            if challenge.is_none() {
                challenge = role.checker.challenge();
            }
        }

        let names: Vec<&str> = roles.iter().map(|r| r.role.as_str()).collect();
        tracing::debug!(route = %route, roles = ?names, "Access unauthorized after checking all roles");
        Decision::Denied { challenge }
    }

    fn warn_legacy_public(&self, route: &Route) {
        if self.warned.insert(route.clone()) {
            tracing::warn!(
                route = %route,
                "Route is unprotected by default; configure authorization for it \
                 since it will no longer be publicly accessible in a future release"
            );
        }
    }
}

async fn authorize(
    State(authorizer): State<Arc<Authorizer>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = Route::new(request.method().clone(), request.uri().path());

    match authorizer.check(&route, request.headers()) {
        Decision::Granted { .. } => {
            metrics::record_auth_decision(true);
            next.run(request).await
        }
        Decision::Denied { challenge } => {
            metrics::record_auth_decision(false);
            unauthorized(challenge)
        }
    }
}

/// The single denial response: 401 with an optional challenge header.
pub(crate) fn unauthorized(challenge: Option<HeaderValue>) -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    if let Some(challenge) = challenge {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge);
    }
    response
}
