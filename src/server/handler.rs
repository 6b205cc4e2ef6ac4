//! Migration request handler and shared application state.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};

use crate::checkpoint::CheckpointPreparer;
use crate::config::GlobalConfig;
use crate::migration::{SessionStore, SessionSummary};
use crate::models::request::MigrationRequestParams;
use crate::pods::PodManager;
use crate::server::body::release_after_send;
use crate::{AppError, Result};

/// Shared application state accessible by all request handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Pods hosted on this node.
    pub pods: Arc<dyn PodManager>,
    /// Checkpoint-preparation callback.
    pub preparer: Arc<dyn CheckpointPreparer>,
    /// In-flight migration sessions.
    pub sessions: SessionStore,
}

/// Query string of `GET /migrate/{pod_uid}`.
#[derive(Debug, Default, Deserialize)]
pub struct MigrateQuery {
    /// Comma-separated container filter.
    #[serde(default)]
    pub containers: Option<String>,
}

/// Handler for `GET /healthz`.
pub async fn health() -> &'static str {
    "ok"
}

/// Handler for `GET /migrations`: the sessions currently in flight.
pub async fn list_migrations(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list())
}

/// Handler for `GET /migrate/{pod_uid}`.
///
/// Checkpoints the requested containers of a running pod and answers with
/// the artifact manifest. The checkpoint producer is released only after
/// the manifest has been sent.
///
/// # Errors
///
/// Returns `404` for unknown pods, `409` for pods that are not running or
/// already migrating, `400` for a bad container filter or a uid that cannot
/// name a checkpoint directory, `504` when the checkpoints are not ready in
/// time, and `500` if the producer gives up.
pub async fn migrate(
    State(state): State<Arc<AppState>>,
    Path(pod_uid): Path<String>,
    Query(query): Query<MigrateQuery>,
) -> Result<Response> {
    let params = MigrationRequestParams::new(pod_uid, query.containers.as_deref());
    let span = info_span!("migrate", pod_uid = %params.pod_uid);
    handle_migration(&state, &params).instrument(span).await
}

async fn handle_migration(state: &AppState, params: &MigrationRequestParams) -> Result<Response> {
    info!(containers = ?params.container_names, "migration requested");

    let pod = state
        .pods
        .pod_by_uid(&params.pod_uid)
        .ok_or_else(|| AppError::NotFound(format!("pod {} is not hosted here", params.pod_uid)))?;

    if !pod.is_running() {
        return Err(AppError::NotRunning(format!(
            "pod {} is {}",
            pod.name, pod.phase
        )));
    }

    let containers = params.resolve_containers(&pod)?;
    let checkpoint_dir = state.config.checkpoint_dir(&pod.uid)?;
    let (mut session, producer) =
        state
            .sessions
            .create(pod.uid.clone(), &pod.name, containers, checkpoint_dir)?;
    session.begin()?;

    info!(
        pod = %pod.name,
        session_id = %session.handle().id(),
        "starting checkpoint of pod"
    );
    let preparer = Arc::clone(&state.preparer);
    tokio::spawn(
        async move {
            if let Err(err) = preparer.prepare(pod, producer).await {
                warn!(%err, "checkpoint preparation failed");
            }
        }
        .in_current_span(),
    );

    // Any early return from here drops the session, which releases the
    // producer and removes the session from the store.
    let result = session
        .wait_until_ready(state.config.timeouts.readiness())
        .await?;
    let payload = serde_json::to_vec(&result)
        .map_err(|err| AppError::Decode(format!("failed to encode migration result: {err}")))?;

    info!(containers = result.len(), "checkpoints ready, sending migration result");
    let body = release_after_send(session, Bytes::from(payload));
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
