// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP trigger service.
//!
//! # Endpoints
//!
//! - `POST /` and `POST /update` - run one reconciliation from a JSON request
//! - `GET /healthz` - liveness probe
//! - `GET /metrics` - Prometheus text exposition
//!
//! # Responses
//!
//! | Result | HTTP Code | Body |
//! |--------|-----------|------|
//! | every mapping in place | 200 | report |
//! | some mappings conflict | 409 | report |
//! | some mutation failed | 502 | report |
//! | run-level error | see [`crate::http_errors`] | `{reason, message}` |

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{field, info, info_span, warn, Instrument, Span};

use crate::config::TargetOverrides;
use crate::directory::DirectoryProvider;
use crate::discovery::{BrokerDiscovery, DiscoveryRequest};
use crate::errors::{ReconcileError, TriggerError};
use crate::http_errors::map_reason_to_http_status;
use crate::metrics::{gather_metrics, record_run_error};
use crate::reconciler::{Reconciler, ReportStatus, RunRequest};

/// Shared state of the trigger service.
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<dyn BrokerDiscovery>,
    pub directories: Arc<dyn DirectoryProvider>,
    pub reconciler: Reconciler,
    pub overrides: TargetOverrides,
}

/// Body of an update request.
///
/// Field names are accepted in lower case or capitalized (`Project`, `Seed`, ...).
#[derive(Default, Deserialize)]
pub struct UpdateRequest {
    #[serde(default, alias = "Project")]
    pub project: Option<String>,
    #[serde(default, alias = "Zone")]
    pub zone: Option<String>,
    #[serde(default, alias = "Prefix")]
    pub prefix: String,
    /// Base64-encoded service-account key
    #[serde(default, alias = "Credentials")]
    pub credentials: String,
    #[serde(default, alias = "User")]
    pub user: String,
    #[serde(default, alias = "Password")]
    pub password: String,
    #[serde(default, alias = "Seed")]
    pub seed: String,
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("project", &self.project)
            .field("zone", &self.zone)
            .field("prefix", &self.prefix)
            .field("credentials", &"<redacted>")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("seed", &self.seed)
            .finish()
    }
}

impl UpdateRequest {
    fn validate(&self) -> Result<(), TriggerError> {
        let missing: Vec<&str> = [
            ("seed", &self.seed),
            ("user", &self.user),
            ("password", &self.password),
            ("credentials", &self.credentials),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TriggerError::BadRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Body of a run-level error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub reason: String,
    pub message: String,
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let reason = self.status_reason();
        let status = StatusCode::from_u16(map_reason_to_http_status(reason))
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = ErrorBody {
            reason: reason.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the trigger router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(update))
        .route("/update", post(update))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the trigger on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn update(State(state): State<AppState>, body: Bytes) -> Response {
    let run_id = format!("{:016x}", rand::random::<u64>());
    let span = info_span!(
        "update",
        run_id = %run_id,
        seed = field::Empty,
        zone = field::Empty
    );

    async move {
        match handle_update(&state, &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    reason = e.status_reason(),
                    error = %e,
                    "Update request failed"
                );
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn handle_update(state: &AppState, body: &[u8]) -> Result<Response, TriggerError> {
    let request: UpdateRequest = serde_json::from_slice(body)
        .map_err(|e| TriggerError::BadRequest(format!("malformed JSON body: {e}")))?;
    request.validate()?;

    let target = state
        .overrides
        .resolve(request.project.as_deref(), request.zone.as_deref())?;

    let span = Span::current();
    span.record("seed", request.seed.as_str());
    span.record("zone", target.zone.as_str());
    info!(
        project = %target.project,
        prefix = %request.prefix,
        user = %request.user,
        "Received update request"
    );

    let credentials = BASE64_STANDARD
        .decode(request.credentials.trim())
        .map_err(|e| TriggerError::Credentials(e.to_string()))?;

    let start = Instant::now();
    let directory = match state.directories.open(&target, &credentials).await {
        Ok(directory) => directory,
        Err(e) => {
            let e = ReconcileError::Directory(e);
            record_run_error(e.status_reason(), start.elapsed());
            return Err(e.into());
        }
    };

    let run = RunRequest {
        discovery: DiscoveryRequest::new(request.seed, request.user, request.password),
        prefix: request.prefix,
    };
    let report = state
        .reconciler
        .run(state.discovery.as_ref(), directory.as_ref(), &run)
        .await?;

    let status = match report.status() {
        ReportStatus::Success => StatusCode::OK,
        ReportStatus::Conflict => StatusCode::CONFLICT,
        ReportStatus::Failed => StatusCode::BAD_GATEWAY,
    };
    Ok((status, Json(report)).into_response())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
