use crate::config::VERSION;
use crate::error::{DaemonError, DaemonResult};
use crate::shutdown::ShutdownTrigger;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use node_updater::{ReleaseSource, Updater, UpdaterError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonVersion {
    pub version: String,
}

fn internal_error(message: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { message })).into_response()
}

struct ApiState<S> {
    updater: Arc<Updater<S>>,
    shutdown: ShutdownTrigger,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            updater: self.updater.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Builder for the daemon's HTTP router.
pub struct ApiBuilder<S> {
    updater: Arc<Updater<S>>,
    shutdown: Option<ShutdownTrigger>,
}

impl<S> ApiBuilder<S>
where
    S: ReleaseSource + 'static,
{
    pub fn new(updater: Arc<Updater<S>>) -> Self {
        Self {
            updater,
            shutdown: None,
        }
    }

    /// Channel the stop endpoint uses to shut the server down gracefully.
    pub fn shutdown(mut self, trigger: ShutdownTrigger) -> Self {
        self.shutdown = Some(trigger);
        self
    }

    /// Build the router.
    ///
    /// The stop endpoint must flush its response before the server goes away,
    /// which only a graceful shutdown guarantees, so a shutdown channel is
    /// required.
    pub fn build(self) -> DaemonResult<Router> {
        let shutdown = self.shutdown.ok_or_else(|| {
            DaemonError::Config(
                "stop endpoint requires a graceful shutdown channel to flush its response".into(),
            )
        })?;
        let state = ApiState {
            updater: self.updater,
            shutdown,
        };

        Ok(Router::new()
            .route("/daemon/version", get(daemon_version))
            .route(
                "/daemon/update",
                get(update_check::<S>).post(update_apply::<S>),
            )
            .route("/daemon/update/status", get(update_status::<S>))
            .route("/daemon/stop", post(daemon_stop::<S>))
            .with_state(state))
    }
}

async fn daemon_version() -> Json<DaemonVersion> {
    Json(DaemonVersion {
        version: VERSION.to_string(),
    })
}

async fn update_check<S>(State(state): State<ApiState<S>>) -> Response
where
    S: ReleaseSource + 'static,
{
    match state.updater.check_for_update().await {
        Ok(info) => Json(info).into_response(),
        Err(err) => internal_error(format!("Failed to fetch latest release: {err}")),
    }
}

/// Applies the latest release. Nothing prevents "updating" to the running
/// version, so callers should check first.
async fn update_apply<S>(State(state): State<ApiState<S>>) -> Response
where
    S: ReleaseSource + 'static,
{
    // Run detached so a client disconnect cannot stop the update between targets.
    let updater = state.updater.clone();
    let outcome = tokio::spawn(async move {
        let release = updater
            .latest_release()
            .await
            .map_err(|err| format!("Failed to fetch latest release: {err}"))?;
        updater
            .apply_release(&release)
            .await
            .map_err(|err| apply_error_message(&err))
    })
    .await;

    match outcome {
        Ok(Ok(report)) => {
            info!(version = %report.version, targets = report.applied.len(), "update applied via API");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Err(message)) => internal_error(message),
        Err(err) => internal_error(format!("Failed to apply update: {err}")),
    }
}

/// Message reported for a failed apply.
pub fn apply_error_message(err: &UpdaterError) -> String {
    if err.is_critical() {
        error!(error = %err, "update rollback failed; operator intervention required");
        format!("Serious error: Failed to rollback from bad update: {err}")
    } else {
        format!("Failed to apply update: {err}")
    }
}

async fn update_status<S>(State(state): State<ApiState<S>>) -> Response
where
    S: ReleaseSource + 'static,
{
    Json(state.updater.phase()).into_response()
}

async fn daemon_stop<S>(State(state): State<ApiState<S>>) -> StatusCode
where
    S: ReleaseSource + 'static,
{
    info!("stop requested via API");
    // Graceful shutdown lets this response finish before the server exits.
    state.shutdown.request();
    StatusCode::NO_CONTENT
}
