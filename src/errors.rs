//! Error types shared across the agent and the trigger client.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all migration failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Workload is unknown to this host.
    NotFound(String),
    /// Workload is known but not in a migratable phase.
    NotRunning(String),
    /// A migration for the same workload is already in flight.
    AlreadyInProgress(String),
    /// Request parameters failed validation.
    InvalidRequest(String),
    /// A bounded wait elapsed before the peer signalled.
    Timeout(String),
    /// The checkpoint producer stopped before reporting every container.
    Incomplete(String),
    /// The handler side of a session is gone; the producer should stop.
    Abandoned(String),
    /// A session signal arrived out of order or was repeated.
    Protocol(String),
    /// The external checkpoint command failed.
    Checkpoint(String),
    /// Peer workload metadata could not be resolved.
    Lookup(String),
    /// The remote agent answered with a non-success status.
    RemoteMigrationFailed {
        /// HTTP status code returned by the remote agent.
        status: u16,
    },
    /// Malformed JSON on the wire.
    Decode(String),
    /// Network failure talking to a peer.
    Transport(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// HTTP status reported to a caller of the migration endpoint.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotRunning(_) | Self::AlreadyInProgress(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::RemoteMigrationFailed { .. } | Self::Transport(_) | Self::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Config(_)
            | Self::Incomplete(_)
            | Self::Abandoned(_)
            | Self::Protocol(_)
            | Self::Checkpoint(_)
            | Self::Lookup(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::NotRunning(msg) => write!(f, "not running: {msg}"),
            Self::AlreadyInProgress(msg) => write!(f, "already in progress: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Incomplete(msg) => write!(f, "incomplete: {msg}"),
            Self::Abandoned(msg) => write!(f, "abandoned: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Checkpoint(msg) => write!(f, "checkpoint: {msg}"),
            Self::Lookup(msg) => write!(f, "lookup: {msg}"),
            Self::RemoteMigrationFailed { status } => {
                write!(f, "remote migration failed: agent answered with status {status}")
            }
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(%status, err = %self, "migration request failed");
        }
        (status, self.to_string()).into_response()
    }
}
