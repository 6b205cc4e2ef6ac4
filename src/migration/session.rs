//! Per-pod migration session and the handler/producer handshake.
//!
//! The handler owns a [`MigrationSession`]; the checkpoint machinery owns
//! the matching [`CheckpointProducer`]. Two single-reader channels connect
//! them:
//!
//! - artifacts flow producer → handler, one message per container, and are
//!   the only way the handler learns a checkpoint path;
//! - a one-shot release flows handler → producer and is sent exactly once,
//!   either explicitly or when the session is dropped.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::migration::options::MigratePodOptions;
use crate::migration::store::SessionStore;
use crate::models::result::MigrationResult;
use crate::models::workload::WorkloadUid;
use crate::{AppError, Result};

/// Lifecycle of a migration session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Registered in the store; producer not started yet.
    Created,
    /// Producer started; waiting for checkpoints.
    AwaitingReadiness,
    /// Every requested container has a reported checkpoint.
    Ready,
    /// Producer has been told it may proceed.
    Released,
    /// Removed from the store.
    Closed,
}

impl SessionPhase {
    /// Determine whether a phase transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        matches!(
            (self, next),
            (SessionPhase::Created, SessionPhase::AwaitingReadiness)
                | (SessionPhase::AwaitingReadiness, SessionPhase::Ready)
                | (
                    SessionPhase::Created | SessionPhase::AwaitingReadiness | SessionPhase::Ready,
                    SessionPhase::Released
                )
                | (SessionPhase::Released, SessionPhase::Closed)
        )
    }
}

/// Why the producer was released.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The migration result was handed to the HTTP stack in full.
    Delivered,
    /// The caller went away while the result was being sent.
    Disconnected,
    /// The handler gave up before producing a result.
    Abandoned,
}

impl ReleaseReason {
    /// Stable lowercase name, used in logs and child-process environments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Disconnected => "disconnected",
            Self::Abandoned => "abandoned",
        }
    }
}

impl Display for ReleaseReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One checkpoint reported by the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointArtifact {
    /// Container the checkpoint belongs to.
    pub container: String,
    /// Where the checkpoint was written.
    pub path: PathBuf,
}

/// Operator-facing view of an active session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionSummary {
    /// Session identifier, unique per request.
    pub session_id: Uuid,
    /// Pod being migrated.
    pub pod_uid: WorkloadUid,
    /// Pod name.
    pub pod_name: String,
    /// Current phase.
    pub phase: SessionPhase,
    /// Containers being checkpointed.
    pub containers: Vec<String>,
    /// When the request was accepted.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionShared {
    id: Uuid,
    pod_uid: WorkloadUid,
    pod_name: String,
    containers: Vec<String>,
    checkpoint_dir: PathBuf,
    created_at: DateTime<Utc>,
    phase: Mutex<SessionPhase>,
}

/// Shared, read-mostly view of a session; cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub(crate) fn new(
        pod_uid: WorkloadUid,
        pod_name: &str,
        containers: Vec<String>,
        checkpoint_dir: PathBuf,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                id: Uuid::new_v4(),
                pod_uid,
                pod_name: pod_name.to_owned(),
                containers,
                checkpoint_dir,
                created_at: Utc::now(),
                phase: Mutex::new(SessionPhase::Created),
            }),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Pod being migrated.
    #[must_use]
    pub fn pod_uid(&self) -> &WorkloadUid {
        &self.shared.pod_uid
    }

    /// Pod name.
    #[must_use]
    pub fn pod_name(&self) -> &str {
        &self.shared.pod_name
    }

    /// Containers to checkpoint, in order.
    #[must_use]
    pub fn containers(&self) -> &[String] {
        &self.shared.containers
    }

    /// Directory receiving the checkpoints.
    #[must_use]
    pub fn checkpoint_dir(&self) -> &Path {
        &self.shared.checkpoint_dir
    }

    /// When the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.shared.created_at
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self
            .shared
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runtime options for the checkpoint machinery.
    #[must_use]
    pub fn options(&self, keep_running: bool) -> MigratePodOptions {
        MigratePodOptions {
            keep_running,
            checkpoints_dir: self.shared.checkpoint_dir.clone(),
            containers: self.shared.containers.clone(),
        }
    }

    /// Operator-facing summary.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.shared.id,
            pod_uid: self.shared.pod_uid.clone(),
            pod_name: self.shared.pod_name.clone(),
            phase: self.phase(),
            containers: self.shared.containers.clone(),
            created_at: self.shared.created_at,
        }
    }

    pub(crate) fn is_same(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Move to `next`, refusing transitions the phase machine does not allow.
    pub(crate) fn advance(&self, next: SessionPhase) -> Result<()> {
        let mut phase = self
            .shared
            .phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let allowed = phase.can_transition_to(next);
        debug_assert!(
            allowed,
            "invalid migration session transition {:?} -> {next:?}",
            *phase
        );
        if !allowed {
            return Err(AppError::Protocol(format!(
                "session {} cannot move from {:?} to {next:?}",
                self.shared.id, *phase
            )));
        }
        *phase = next;
        Ok(())
    }
}

/// Build the two halves of a freshly registered session.
pub(crate) fn pair(
    handle: SessionHandle,
    store: SessionStore,
) -> (MigrationSession, CheckpointProducer) {
    // Each container is reported at most once, so this bound never blocks.
    let capacity = handle.containers().len().max(1);
    let (artifact_tx, artifact_rx) = mpsc::channel(capacity);
    let (release_tx, release_rx) = oneshot::channel();

    let session = MigrationSession {
        handle: handle.clone(),
        store,
        artifacts: artifact_rx,
        release: Some(release_tx),
    };
    let producer = CheckpointProducer {
        handle,
        artifacts: Some(artifact_tx),
        release: Some(release_rx),
        reported: HashSet::new(),
    };
    (session, producer)
}

/// Handler half of a migration session.
///
/// Dropping it releases the producer (if that has not happened yet) and
/// removes the session from its store, so every exit path of the handler,
/// including cancellation, tears the session down.
#[derive(Debug)]
pub struct MigrationSession {
    handle: SessionHandle,
    store: SessionStore,
    artifacts: mpsc::Receiver<CheckpointArtifact>,
    release: Option<oneshot::Sender<ReleaseReason>>,
}

impl MigrationSession {
    /// Shared view of this session.
    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Mark the producer as started.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the session already left `Created`.
    pub fn begin(&self) -> Result<()> {
        self.handle.advance(SessionPhase::AwaitingReadiness)
    }

    /// Collect one artifact per requested container.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` if `timeout` elapses first, or
    /// `AppError::Incomplete` if the producer stops reporting early.
    /// A `timeout` too large to form a deadline is `AppError::InvalidRequest`.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<MigrationResult> {
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "readiness timeout of {}s is out of range",
                timeout.as_secs()
            ))
        })?;
        let expected = self.handle.containers().len();
        let mut result = MigrationResult::default();

        while result.len() < expected {
            match tokio::time::timeout_at(deadline, self.artifacts.recv()).await {
                Ok(Some(artifact)) => {
                    debug!(
                        container = %artifact.container,
                        path = %artifact.path.display(),
                        "checkpoint reported"
                    );
                    result.insert(artifact.container, &artifact.path);
                }
                Ok(None) => {
                    return Err(AppError::Incomplete(format!(
                        "checkpoint producer for pod {} stopped; missing {}",
                        self.handle.pod_uid(),
                        self.missing(&result)
                    )));
                }
                Err(_elapsed) => {
                    return Err(AppError::Timeout(format!(
                        "checkpoints for pod {} not ready after {}s; missing {}",
                        self.handle.pod_uid(),
                        timeout.as_secs(),
                        self.missing(&result)
                    )));
                }
            }
        }

        self.handle.advance(SessionPhase::Ready)?;
        Ok(result)
    }

    /// Tell the producer it may proceed past its checkpoint point.
    ///
    /// Must be called at most once; the session guarantees a release on drop
    /// if it was never called.
    pub fn release(&mut self, reason: ReleaseReason) {
        debug_assert!(self.release.is_some(), "release signalled twice");
        self.signal_release(reason);
    }

    /// Whether the producer has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    fn signal_release(&mut self, reason: ReleaseReason) {
        let Some(sender) = self.release.take() else {
            return;
        };
        if let Err(err) = self.handle.advance(SessionPhase::Released) {
            warn!(%err, "releasing session from unexpected phase");
        }
        let producer_waiting = sender.send(reason).is_ok();
        info!(
            pod_uid = %self.handle.pod_uid(),
            session_id = %self.handle.id(),
            %reason,
            producer_waiting,
            "released checkpoint producer"
        );
    }

    fn missing(&self, result: &MigrationResult) -> String {
        let missing: Vec<&str> = self
            .handle
            .containers()
            .iter()
            .map(String::as_str)
            .filter(|c| result.checkpoint_path(c).is_none())
            .collect();
        missing.join(", ")
    }
}

impl Drop for MigrationSession {
    fn drop(&mut self) {
        self.signal_release(ReleaseReason::Abandoned);
        self.store.remove_session(&self.handle);
        if let Err(err) = self.handle.advance(SessionPhase::Closed) {
            warn!(%err, "closing session from unexpected phase");
        }
    }
}

/// Producer half of a migration session, handed to the checkpoint machinery.
#[derive(Debug)]
pub struct CheckpointProducer {
    handle: SessionHandle,
    artifacts: Option<mpsc::Sender<CheckpointArtifact>>,
    release: Option<oneshot::Receiver<ReleaseReason>>,
    reported: HashSet<String>,
}

impl CheckpointProducer {
    /// Shared view of this session.
    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Runtime options for the container runtime.
    #[must_use]
    pub fn options(&self, keep_running: bool) -> MigratePodOptions {
        self.handle.options(keep_running)
    }

    /// Default artifact location for `container`.
    #[must_use]
    pub fn checkpoint_path(&self, container: &str) -> PathBuf {
        self.handle.checkpoint_dir().join(container)
    }

    /// Containers not reported yet, in order.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.handle
            .containers()
            .iter()
            .map(String::as_str)
            .filter(|c| !self.reported.contains(*c))
            .collect()
    }

    /// Report that the checkpoint of `container` exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the container is not part of the
    /// session, was already reported, or reporting was stopped, and
    /// `AppError::Abandoned` if the handler has given up on the session.
    pub fn artifact_created(&mut self, container: &str, path: impl Into<PathBuf>) -> Result<()> {
        let Some(artifacts) = &self.artifacts else {
            return Err(AppError::Protocol(format!(
                "checkpoint reporting for pod {} already stopped",
                self.handle.pod_uid()
            )));
        };
        if !self.handle.containers().iter().any(|c| c == container) {
            return Err(AppError::Protocol(format!(
                "container {container} is not part of migration session {}",
                self.handle.id()
            )));
        }
        if self.reported.contains(container) {
            return Err(AppError::Protocol(format!(
                "checkpoint for container {container} already reported"
            )));
        }

        let artifact = CheckpointArtifact {
            container: container.to_owned(),
            path: path.into(),
        };
        artifacts.try_send(artifact).map_err(|err| match err {
            TrySendError::Closed(_) => AppError::Abandoned(format!(
                "migration session for pod {} is closed",
                self.handle.pod_uid()
            )),
            TrySendError::Full(_) => AppError::Protocol(format!(
                "artifact channel for pod {} is full",
                self.handle.pod_uid()
            )),
        })?;
        self.reported.insert(container.to_owned());
        Ok(())
    }

    /// Stop reporting checkpoints.
    ///
    /// A handler still waiting for readiness sees the session as
    /// incomplete right away instead of running into its timeout.
    pub fn stop_reporting(&mut self) {
        if self.artifacts.take().is_some() {
            debug!(
                pod_uid = %self.handle.pod_uid(),
                pending = ?self.pending(),
                "checkpoint reporting stopped"
            );
        }
    }

    /// Block until the handler releases this producer or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` if no release arrives in time, and
    /// `AppError::Protocol` if called twice.
    pub async fn wait_for_release(&mut self, timeout: Duration) -> Result<ReleaseReason> {
        let Some(receiver) = self.release.take() else {
            return Err(AppError::Protocol(format!(
                "release for pod {} already awaited",
                self.handle.pod_uid()
            )));
        };

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(reason)) => Ok(reason),
            Ok(Err(_closed)) => Ok(ReleaseReason::Abandoned),
            Err(_elapsed) => Err(AppError::Timeout(format!(
                "release for pod {} not signalled within {}s",
                self.handle.pod_uid(),
                timeout.as_secs()
            ))),
        }
    }
}
