//! Route keys and the control server allow-list.
//!
//! # Responsibilities
//! - Identify a control-plane operation by (method, path)
//! - Parse and render the `"METHOD /path"` configuration form
//! - Membership test against the fixed set of supported routes

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Routes served by the control server. Do not mutate.
const SUPPORTED_ROUTES: &[(&str, &str)] = &[
    ("GET", "/openvpn/actions/restart"),
    ("GET", "/unbound/actions/restart"),
    ("GET", "/updater/restart"),
    ("GET", "/v1/version"),
    ("GET", "/v1/vpn/status"),
    ("PUT", "/v1/vpn/status"),
    ("GET", "/v1/openvpn/status"),
    ("PUT", "/v1/openvpn/status"),
    ("GET", "/v1/openvpn/portforwarded"),
    ("GET", "/v1/dns/status"),
    ("PUT", "/v1/dns/status"),
    ("GET", "/v1/updater/status"),
    ("PUT", "/v1/updater/status"),
    ("GET", "/v1/publicip/ip"),
];

/// Routes that were reachable without any authorization configuration in
/// earlier releases. Granting one of them through a `none` checker logs a
/// deprecation warning.
const LEGACY_PUBLIC_ROUTES: &[(&str, &str)] = SUPPORTED_ROUTES;

/// An HTTP method and path identifying one control-plane operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Route {
    method: Method,
    path: String,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns true if the control server serves this route.
    pub fn is_supported(&self) -> bool {
        contains(SUPPORTED_ROUTES, self)
    }

    /// Returns true if this route used to be public by default.
    pub fn is_legacy_public(&self) -> bool {
        contains(LEGACY_PUBLIC_ROUTES, self)
    }

    /// All supported routes, in declaration order.
    pub fn supported() -> impl Iterator<Item = Route> {
        to_routes(SUPPORTED_ROUTES)
    }

    /// Routes that were public by default, in declaration order.
    pub fn legacy_public() -> impl Iterator<Item = Route> {
        to_routes(LEGACY_PUBLIC_ROUTES)
    }
}

fn contains(table: &[(&str, &str)], route: &Route) -> bool {
    table
        .iter()
        .any(|(method, path)| route.method == *method && route.path == *path)
}

fn to_routes(table: &'static [(&'static str, &'static str)]) -> impl Iterator<Item = Route> {
    table.iter().filter_map(|(method, path)| {
        Method::from_bytes(method.as_bytes())
            .ok()
            .map(|method| Route::new(method, *path))
    })
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Error parsing the `"METHOD /path"` form of a route.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteParseError {
    #[error("route {0:?} must be of the form \"METHOD /path\"")]
    Format(String),

    #[error("invalid HTTP method {0:?}")]
    Method(String),

    #[error("route path {0:?} must start with '/'")]
    Path(String),
}

impl FromStr for Route {
    type Err = RouteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        let (Some(method), Some(path), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(RouteParseError::Format(s.to_string()));
        };

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| RouteParseError::Method(method.to_string()))?;
        if !path.starts_with('/') {
            return Err(RouteParseError::Path(path.to_string()));
        }

        Ok(Route::new(method, path))
    }
}

impl TryFrom<String> for Route {
    type Error = RouteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        route.to_string()
    }
}
