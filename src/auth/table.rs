//! Compiled route authorization table.
//!
//! Built once from validated settings, immutable afterwards and shared
//! between request tasks without locking.

use std::collections::HashMap;

use crate::auth::checker::Checker;
use crate::auth::route::Route;
use crate::auth::settings::{AuthError, Settings};

/// A role allowed on a route, with one of its checkers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChecker {
    pub role: String,
    pub checker: Checker,
}

/// Lookup table from route to the roles allowed on it, in declaration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<Route, Vec<RoleChecker>>,
}

impl RouteTable {
    /// Validates the settings and builds the table.
    ///
    /// Roles are appended to each of their routes in declaration order, which
    /// is the order checkers are attempted in. A checker equal to one already
    /// present on a route is skipped.
    pub fn compile(settings: &Settings) -> Result<Self, AuthError> {
        let mut routes: HashMap<Route, Vec<RoleChecker>> = HashMap::new();

        for (role, checkers) in settings.resolve()? {
            for route in &role.routes {
                let entry = routes.entry(route.clone()).or_default();
                for checker in &checkers {
                    if entry.iter().any(|existing| existing.checker.equal(checker)) {
                        continue;
                    }
                    entry.push(RoleChecker {
                        role: role.name.clone(),
                        checker: checker.clone(),
                    });
                }
            }
        }

        Ok(Self { routes })
    }

    /// Roles allowed on the route, or `None` if no role declares it.
    pub fn get(&self, route: &Route) -> Option<&[RoleChecker]> {
        self.routes.get(route).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
