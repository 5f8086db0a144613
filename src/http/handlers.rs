//! Control API handlers.
//!
//! Every handler runs behind the authorization middleware; none of them
//! check credentials themselves.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::http::info::{DaemonInfo, PublicIp};
use crate::lifecycle::status::UnknownStatus;
use crate::lifecycle::{LifecycleError, LoopStatus, Looper, Outcome};

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionBody {
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeBody {
    pub outcome: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PortBody {
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error returned to API clients as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidStatus(_) => ApiError::BadRequest(e.to_string()),
            LifecycleError::TransitionAborted { .. } => {
                tracing::error!(error = %e, "Loop transition failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn outcome_body(outcome: Outcome) -> Json<OutcomeBody> {
    Json(OutcomeBody {
        outcome: outcome.to_string(),
    })
}

pub async fn version() -> Json<VersionBody> {
    Json(VersionBody {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_status(State(looper): State<Looper>) -> Json<StatusBody> {
    Json(StatusBody {
        status: looper.status().to_string(),
    })
}

/// Drives the looper to the requested status. Dropping the request (client
/// gone) cancels the wait but not the transition.
pub async fn put_status(
    State(looper): State<Looper>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<OutcomeBody>, ApiError> {
    let Json(body) = body?;
    let target: LoopStatus = body
        .status
        .parse()
        .map_err(|e: UnknownStatus| ApiError::BadRequest(e.to_string()))?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = looper.set_status(target, &cancel).await?;
    tracing::info!(loop_name = %looper.name(), outcome = %outcome, "Status change requested");
    Ok(outcome_body(outcome))
}

pub async fn restart(State(looper): State<Looper>) -> Result<Json<OutcomeBody>, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = looper.restart(&cancel).await?;
    tracing::info!(loop_name = %looper.name(), outcome = %outcome, "Restart requested");
    Ok(outcome_body(outcome))
}

pub async fn port_forwarded(State(info): State<DaemonInfo>) -> Json<PortBody> {
    Json(PortBody {
        port: info.port_forwarded(),
    })
}

pub async fn public_ip(State(info): State<DaemonInfo>) -> Json<PublicIp> {
    Json(PublicIp::clone(&info.public_ip()))
}
