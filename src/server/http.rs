//! HTTP transport for the migration endpoint.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handler::{health, list_migrations, migrate, AppState};
use crate::{AppError, Result};

/// Build the agent's router.
///
/// - `GET /migrate/{pod_uid}?containers=a,b`: checkpoint and report
/// - `GET /migrations`: sessions in flight
/// - `GET /healthz`: liveness
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/migrate/{pod_uid}", get(migrate))
        .route("/migrations", get(list_migrations))
        .route("/healthz", get(health))
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails to bind, and
/// `AppError::Io` if serving fails.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = state.config.bind_addr();
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind migration endpoint on {bind}: {err}")))?;
    serve_with_listener(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// In-flight migrations are allowed to finish during shutdown.
///
/// # Errors
///
/// Returns `AppError::Io` if serving fails.
pub async fn serve_with_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener has no local address: {err}")))?;
    info!(%local, "starting migration endpoint");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("migration endpoint error: {err}")))?;

    info!("migration endpoint shut down");
    Ok(())
}
