//! Authentication checkers.
//!
//! A checker decides whether a request satisfies one authentication
//! requirement. Checkers only inspect request headers: they never write to
//! the response, the middleware builds the single denial response itself.

use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Header carrying the client API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Value of the `WWW-Authenticate` header sent on Basic denials.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// Runtime form of an authentication method.
#[derive(Clone, PartialEq, Eq)]
pub enum Checker {
    /// Grants every request.
    None,
    /// HTTP Basic; stores the SHA-256 of `username + password`.
    Basic { hash: [u8; 32] },
    /// Static API key read from the `X-API-Key` header.
    ApiKey { key: Vec<u8> },
}

impl Checker {
    pub fn basic(username: &str, password: &str) -> Self {
        Checker::Basic {
            hash: credentials_hash(username, password),
        }
    }

    pub fn api_key(key: &str) -> Self {
        Checker::ApiKey {
            key: key.as_bytes().to_vec(),
        }
    }

    /// Returns true if the request headers satisfy this checker.
    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        match self {
            Checker::None => true,
            Checker::Basic { hash } => match basic_credentials(headers) {
                Some((username, password)) => {
                    let provided = credentials_hash(&username, &password);
                    hash[..].ct_eq(&provided[..]).into()
                }
                None => false,
            },
            Checker::ApiKey { key } => headers
                .get(API_KEY_HEADER)
                .is_some_and(|provided| ct_eq(key, provided.as_bytes())),
        }
    }

    /// Structural equality, used to drop duplicate checkers on a route.
    /// Never use this for an access decision.
    pub fn equal(&self, other: &Checker) -> bool {
        self == other
    }

    /// Challenge header value to send when access is denied.
    pub fn challenge(&self) -> Option<HeaderValue> {
        match self {
            Checker::Basic { .. } => Some(HeaderValue::from_static(BASIC_CHALLENGE)),
            Checker::None | Checker::ApiKey { .. } => None,
        }
    }

    /// Short method name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Checker::None => "none",
            Checker::Basic { .. } => "basic",
            Checker::ApiKey { .. } => "apikey",
        }
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checker({})", self.kind())
    }
}

fn credentials_hash(username: &str, password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Constant-time comparison; only the length leaks.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}

/// Extracts the username and password of an `Authorization: Basic` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
