//! Control server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the control API handlers
//! - Wrap it in the authorization middleware and the legacy fallback gate
//! - Wire up request IDs and optional request logging
//! - Serve until shutdown is signalled

use axum::{
    body::Body,
    http::Request,
    routing::{get, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{AuthError, Authorizer, FallbackGate};
use crate::config::{ControlServerConfig, DaemonConfig};
use crate::http::handlers;
use crate::http::info::DaemonInfo;
use crate::lifecycle::{Looper, ShutdownSignal};

/// The loops the control server drives.
#[derive(Debug, Clone)]
pub struct Loopers {
    pub vpn: Looper,
    pub dns: Looper,
    pub updater: Looper,
}

/// HTTP control server of the daemon.
pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    /// Build the server. Fails if the authorization settings do not compile.
    pub fn new(config: &DaemonConfig, loopers: Loopers, info: DaemonInfo) -> Result<Self, AuthError> {
        let authorizer = Authorizer::new(&config.auth_settings())?;
        let gate = fallback_gate(&config.control_server, config.auth.is_some());
        let router = Self::build_router(&config.control_server, authorizer, gate, loopers, info);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &ControlServerConfig,
        authorizer: Authorizer,
        gate: Option<FallbackGate>,
        loopers: Loopers,
        info: DaemonInfo,
    ) -> Router {
        let router = Router::new()
            .route("/v1/version", get(handlers::version))
            .route("/v1/vpn/status", status_routes(&loopers.vpn))
            .route("/v1/openvpn/status", status_routes(&loopers.vpn))
            .route("/v1/dns/status", status_routes(&loopers.dns))
            .route("/v1/updater/status", status_routes(&loopers.updater))
            .route(
                "/openvpn/actions/restart",
                get(handlers::restart).with_state(loopers.vpn),
            )
            .route(
                "/unbound/actions/restart",
                get(handlers::restart).with_state(loopers.dns),
            )
            .route(
                "/updater/restart",
                get(handlers::restart).with_state(loopers.updater),
            )
            .route(
                "/v1/openvpn/portforwarded",
                get(handlers::port_forwarded).with_state(info.clone()),
            )
            .route("/v1/publicip/ip", get(handlers::public_ip).with_state(info));

        let mut router = authorizer.wrap(router);
        if let Some(gate) = gate {
            router = gate.wrap(router);
        }
        if config.log {
            router = router.layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                },
            ));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on the given listener until shutdown is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Control server received shutdown signal");
            })
            .await?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

fn status_routes<S>(looper: &Looper) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    get(handlers::get_status)
        .put(handlers::put_status)
        .with_state(looper.clone())
}

/// The legacy credential pair only applies without role-based settings.
fn fallback_gate(config: &ControlServerConfig, auth_configured: bool) -> Option<FallbackGate> {
    let has_credentials = !config.username.is_empty() || !config.password.is_empty();
    if auth_configured {
        if has_credentials {
            tracing::warn!(
                "Control server username and password are ignored since authorization settings are configured"
            );
        }
        return None;
    }

    let gate = FallbackGate::new(&config.username, &config.password);
    if gate.is_none() {
        tracing::warn!(
            "Control server username or password is empty, routes are only protected by the default authorization settings"
        );
    }
    gate
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    fn server(config: DaemonConfig) -> (ControlServer, Loopers, DaemonInfo) {
        let (vpn, _) = Looper::new("vpn");
        let (dns, _) = Looper::new("dns");
        let (updater, _) = Looper::new("updater");
        let loopers = Loopers { vpn, dns, updater };
        let info = DaemonInfo::new();
        let server = ControlServer::new(&config, loopers.clone(), info.clone()).unwrap();
        (server, loopers, info)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn legacy_public_defaults_serve_every_route() {
        let (server, _, info) = server(DaemonConfig::default());
        info.set_port_forwarded(4444);

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/version"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(
            body_json(response).await["version"],
            env!("CARGO_PKG_VERSION")
        );

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/openvpn/status"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "stopped");

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/openvpn/portforwarded"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["port"], 4444);

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/publicip/ip"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["public_ip"], "");
    }

    #[tokio::test]
    async fn undeclared_routes_are_unauthorized() {
        let (server, _, _) = server(DaemonConfig::default());
        for (method, uri) in [
            (Method::GET, "/v1/vpn/settings"),
            (Method::DELETE, "/v1/vpn/status"),
            (Method::GET, "/nope"),
        ] {
            let response = server.router().oneshot(request(method, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            assert!(response.headers().contains_key("x-request-id"));
        }
    }

    #[tokio::test]
    async fn put_status_rejects_bad_bodies() {
        let (server, loopers, _) = server(DaemonConfig::default());

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/v1/dns/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/v1/dns/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status":"stopping"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(loopers.dns.status(), crate::lifecycle::LoopStatus::Stopped);
    }

    #[tokio::test]
    async fn stopping_a_stopped_loop_is_already_stopped() {
        let (server, _, _) = server(DaemonConfig::default());
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/v1/updater/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status":"stopped"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["outcome"], "already stopped");
    }

    #[tokio::test]
    async fn fallback_gate_protects_everything() {
        let mut config = DaemonConfig::default();
        config.control_server.username = "user".to_string();
        config.control_server.password = "pass".to_string();
        let (server, _, _) = server(config);

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/version"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let mut authorized = request(Method::GET, "/v1/version");
        authorized.headers_mut().insert(
            header::AUTHORIZATION,
            "Basic dXNlcjpwYXNz".parse().unwrap(),
        );
        let response = server.router().oneshot(authorized).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn role_settings_override_fallback_credentials() {
        let mut config: DaemonConfig = toml::from_str(
            r#"
[[auth.roles]]
name = "public"
auth = "none"
routes = ["GET /v1/version"]
"#,
        )
        .unwrap();
        config.control_server.username = "user".to_string();
        config.control_server.password = "pass".to_string();
        let (server, _, _) = server(config);

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/version"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = server
            .router()
            .oneshot(request(Method::GET, "/v1/vpn/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_settings_fail_construction() {
        let config: DaemonConfig = toml::from_str(
            r#"
[[auth.roles]]
name = "admin"
auths = ["missing"]
"#,
        )
        .unwrap();
        let (vpn, _) = Looper::new("vpn");
        let (dns, _) = Looper::new("dns");
        let (updater, _) = Looper::new("updater");
        let result = ControlServer::new(&config, Loopers { vpn, dns, updater }, DaemonInfo::new());
        assert!(matches!(result, Err(AuthError::AuthNameNotDefined { .. })));
    }
}
