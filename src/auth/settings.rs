//! Declarative authorization settings.
//!
//! A role grants access to a list of routes to requests that pass any of its
//! authentications. Authentications are either declared inline on the role
//! (`auth = "none"`) or shared in `auths` and referenced by name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::checker::Checker;
use crate::auth::route::Route;

pub const METHOD_NONE: &str = "none";
pub const METHOD_BASIC: &str = "basic";
pub const METHOD_API_KEY: &str = "apikey";

/// Errors found while validating or compiling settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication name is not unique: {name:?} for auths {index} and {existing} of {total}")]
    AuthNameNotUnique {
        name: String,
        index: usize,
        existing: usize,
        total: usize,
    },

    #[error("authentication name not defined: {name:?} for role {role} ({index} of {total})")]
    AuthNameNotDefined {
        name: String,
        role: String,
        index: usize,
        total: usize,
    },

    #[error("authentication method not supported: {method:?} for {owner}, it can only be one of: none, basic, apikey")]
    MethodNotSupported { owner: String, method: String },

    #[error("API key is empty for {owner}")]
    ApiKeyEmpty { owner: String },

    #[error("route not supported by the control server: {route} for role {role} (route {index} of {total})")]
    RouteNotSupported {
        route: Route,
        role: String,
        index: usize,
        total: usize,
    },
}

/// Authorization settings for the control server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Shared authentications that roles reference by name.
    pub auths: Vec<Auth>,
    /// Roles with their authentications and accessible routes.
    pub roles: Vec<Role>,
}

/// A named authentication method with its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    /// Unique authentication name.
    pub name: String,
    /// One of `none`, `basic` or `apikey`.
    pub method: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub api_key: String,
}

/// A named set of routes and the authentications that unlock them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Role {
    /// Role name, only used in logs.
    pub name: String,
    /// Inline authentication method, one of `none`, `basic` or `apikey`.
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub api_key: String,
    /// Names of shared authentications the role accepts.
    #[serde(default)]
    pub auths: Vec<String>,
    /// Routes the role can access.
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl Settings {
    /// Settings used when no authorization is configured: every legacy
    /// public route stays reachable without credentials.
    pub fn legacy_public() -> Self {
        Self {
            auths: vec![Auth {
                name: "public".to_string(),
                method: METHOD_NONE.to_string(),
                username: String::new(),
                password: String::new(),
                api_key: String::new(),
            }],
            roles: vec![Role {
                name: "public".to_string(),
                auth: None,
                username: String::new(),
                password: String::new(),
                api_key: String::new(),
                auths: vec!["public".to_string()],
                routes: Route::legacy_public().collect(),
            }],
        }
    }

    /// Validates the settings and resolves each role to its ordered checkers.
    pub(crate) fn resolve(&self) -> Result<Vec<(&Role, Vec<Checker>)>, AuthError> {
        let total = self.auths.len();
        let mut shared: HashMap<&str, (usize, Checker)> = HashMap::with_capacity(total);
        for (i, auth) in self.auths.iter().enumerate() {
            if let Some((existing, _)) = shared.get(auth.name.as_str()) {
                return Err(AuthError::AuthNameNotUnique {
                    name: auth.name.clone(),
                    index: i + 1,
                    existing: existing + 1,
                    total,
                });
            }
            let owner = format!("auth {} ({} of {})", auth.name, i + 1, total);
            let checker = build_checker(
                &owner,
                &auth.method,
                &auth.username,
                &auth.password,
                &auth.api_key,
            )?;
            shared.insert(auth.name.as_str(), (i, checker));
        }

        let total = self.roles.len();
        let mut resolved = Vec::with_capacity(total);
        for (i, role) in self.roles.iter().enumerate() {
            let mut checkers = Vec::with_capacity(role.auths.len() + 1);

            if let Some(method) = &role.auth {
                let owner = format!("role {} ({} of {})", role.name, i + 1, total);
                checkers.push(build_checker(
                    &owner,
                    method,
                    &role.username,
                    &role.password,
                    &role.api_key,
                )?);
            }

            for name in &role.auths {
                let (_, checker) =
                    shared
                        .get(name.as_str())
                        .ok_or_else(|| AuthError::AuthNameNotDefined {
                            name: name.clone(),
                            role: role.name.clone(),
                            index: i + 1,
                            total,
                        })?;
                checkers.push(checker.clone());
            }

            let route_total = role.routes.len();
            for (j, route) in role.routes.iter().enumerate() {
                if !route.is_supported() {
                    return Err(AuthError::RouteNotSupported {
                        route: route.clone(),
                        role: role.name.clone(),
                        index: j + 1,
                        total: route_total,
                    });
                }
            }

            resolved.push((role, checkers));
        }

        Ok(resolved)
    }

    /// Validates the settings without building anything.
    pub fn validate(&self) -> Result<(), AuthError> {
        self.resolve().map(|_| ())
    }

    pub fn auth_names(&self) -> Vec<&str> {
        self.auths.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.name.as_str()).collect()
    }
}

fn build_checker(
    owner: &str,
    method: &str,
    username: &str,
    password: &str,
    api_key: &str,
) -> Result<Checker, AuthError> {
    match method {
        METHOD_NONE => Ok(Checker::None),
        METHOD_BASIC => Ok(Checker::basic(username, password)),
        METHOD_API_KEY if api_key.is_empty() => Err(AuthError::ApiKeyEmpty {
            owner: owner.to_string(),
        }),
        METHOD_API_KEY => Ok(Checker::api_key(api_key)),
        other => Err(AuthError::MethodNotSupported {
            owner: owner.to_string(),
            method: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn auth(name: &str, method: &str) -> Auth {
        Auth {
            name: name.to_string(),
            method: method.to_string(),
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
        }
    }

    fn role(name: &str, auths: &[&str], routes: &[&str]) -> Role {
        Role {
            name: name.to_string(),
            auth: None,
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            auths: auths.iter().map(|a| a.to_string()).collect(),
            routes: routes.iter().map(|r| r.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn legacy_public_is_valid() {
        let settings = Settings::legacy_public();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.auth_names(), vec!["public"]);
        assert_eq!(settings.role_names(), vec!["public"]);
        assert!(settings.roles[0]
            .routes
            .contains(&Route::new(Method::GET, "/v1/publicip/ip")));
    }

    #[test]
    fn empty_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn duplicate_auth_name() {
        let settings = Settings {
            auths: vec![auth("a", "none"), auth("b", "none"), auth("a", "basic")],
            roles: vec![],
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthNameNotUnique {
                name: "a".to_string(),
                index: 3,
                existing: 1,
                total: 3,
            }
        );
        assert_eq!(
            err.to_string(),
            "authentication name is not unique: \"a\" for auths 3 and 1 of 3"
        );
    }

    #[test]
    fn undefined_auth_reference() {
        let settings = Settings {
            auths: vec![auth("a", "none")],
            roles: vec![role("admin", &["b"], &["GET /v1/version"])],
        };
        assert!(matches!(
            settings.validate(),
            Err(AuthError::AuthNameNotDefined { name, role, .. }) if name == "b" && role == "admin"
        ));
    }

    #[test]
    fn unsupported_method() {
        let settings = Settings {
            auths: vec![auth("x", "oauth2")],
            roles: vec![],
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, AuthError::MethodNotSupported { ref method, .. } if method == "oauth2"));
        assert!(err.to_string().contains("none, basic, apikey"));

        let mut inline = role("r", &[], &[]);
        inline.auth = Some("digest".to_string());
        let settings = Settings {
            auths: vec![],
            roles: vec![inline],
        };
        assert!(matches!(
            settings.validate(),
            Err(AuthError::MethodNotSupported { .. })
        ));
    }

    #[test]
    fn empty_api_key() {
        let settings = Settings {
            auths: vec![auth("key", "apikey")],
            roles: vec![],
        };
        assert!(matches!(
            settings.validate(),
            Err(AuthError::ApiKeyEmpty { .. })
        ));

        let mut inline = role("r", &[], &["GET /v1/version"]);
        inline.auth = Some("apikey".to_string());
        let settings = Settings {
            auths: vec![],
            roles: vec![inline.clone()],
        };
        assert!(matches!(
            settings.validate(),
            Err(AuthError::ApiKeyEmpty { .. })
        ));

        inline.api_key = "k".to_string();
        let settings = Settings {
            auths: vec![],
            roles: vec![inline],
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unsupported_route() {
        let settings = Settings {
            auths: vec![auth("a", "none")],
            roles: vec![role(
                "public",
                &["a"],
                &["GET /v1/version", "GET /v1/vpn/settings"],
            )],
        };
        assert_eq!(
            settings.validate().unwrap_err().to_string(),
            "route not supported by the control server: GET /v1/vpn/settings for role public (route 2 of 2)"
        );
    }

    #[test]
    fn resolves_inline_then_referenced() {
        let mut admin = role("admin", &["key"], &["PUT /v1/vpn/status"]);
        admin.auth = Some("basic".to_string());
        admin.username = "a".to_string();
        admin.password = "b".to_string();
        let mut key = auth("key", "apikey");
        key.api_key = "k".to_string();

        let settings = Settings {
            auths: vec![key],
            roles: vec![admin],
        };
        let resolved = settings.resolve().unwrap();
        assert_eq!(resolved.len(), 1);
        let (role, checkers) = &resolved[0];
        assert_eq!(role.name, "admin");
        assert_eq!(checkers, &vec![Checker::basic("a", "b"), Checker::api_key("k")]);
    }

    #[test]
    fn parses_toml() {
        let settings: Settings = toml::from_str(
            r#"
[[auths]]
name = "abc"
method = "none"

[[roles]]
name = "public"
auths = ["abc"]
routes = ["GET /v1/vpn/status"]

[[roles]]
name = "scripts"
auth = "apikey"
api_key = "xyz"
routes = ["PUT /v1/vpn/status"]
"#,
        )
        .unwrap();
        assert_eq!(settings.auths, vec![auth("abc", "none")]);
        assert_eq!(settings.roles.len(), 2);
        assert_eq!(settings.roles[1].auth.as_deref(), Some("apikey"));
        assert!(settings.validate().is_ok());

        let unknown = toml::from_str::<Settings>(r#"unknown = "what is this""#);
        assert!(unknown.is_err());
    }
}
