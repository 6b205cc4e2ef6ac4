//! Registry of in-flight migration sessions keyed by pod uid.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::migration::session::{
    self, CheckpointProducer, MigrationSession, SessionHandle, SessionSummary,
};
use crate::models::workload::WorkloadUid;
use crate::{AppError, Result};

/// Concurrency-safe session registry.
///
/// Membership is guarded by one mutex held only for map operations, never
/// across an await point. Cloning shares the same registry.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<WorkloadUid, SessionHandle>>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `pod_uid` and return both of its halves.
    ///
    /// The existence check and the insert happen under one lock, so of any
    /// number of concurrent calls for the same pod exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AlreadyInProgress` if a session for `pod_uid`
    /// exists, and `AppError::InvalidRequest` if `containers` is empty.
    pub fn create(
        &self,
        pod_uid: WorkloadUid,
        pod_name: &str,
        containers: Vec<String>,
        checkpoint_dir: PathBuf,
    ) -> Result<(MigrationSession, CheckpointProducer)> {
        if containers.is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "migration of pod {pod_uid} names no containers"
            )));
        }

        let handle = {
            let mut sessions = self.lock();
            if sessions.contains_key(&pod_uid) {
                return Err(AppError::AlreadyInProgress(format!(
                    "migration of pod {pod_uid} is already in progress"
                )));
            }
            let handle = SessionHandle::new(pod_uid.clone(), pod_name, containers, checkpoint_dir);
            sessions.insert(pod_uid, handle.clone());
            handle
        };

        info!(
            pod_uid = %handle.pod_uid(),
            session_id = %handle.id(),
            containers = ?handle.containers(),
            "migration session created"
        );
        Ok(session::pair(handle, self.clone()))
    }

    /// Look up the active session for `pod_uid`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no session is registered.
    pub fn find(&self, pod_uid: &str) -> Result<SessionHandle> {
        self.lock()
            .get(pod_uid)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("no migration in progress for pod {pod_uid}")))
    }

    /// Erase the session for `pod_uid`. Unknown uids are ignored.
    pub fn remove(&self, pod_uid: &str) {
        if self.lock().remove(pod_uid).is_some() {
            debug!(pod_uid, "migration session removed");
        }
    }

    /// Whether a session is registered for `pod_uid`.
    #[must_use]
    pub fn contains(&self, pod_uid: &str) -> bool {
        self.lock().contains_key(pod_uid)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Summaries of all registered sessions, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> =
            self.lock().values().map(SessionHandle::summary).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Remove `handle` only if it is still the registered session for its pod.
    pub(crate) fn remove_session(&self, handle: &SessionHandle) {
        let mut sessions = self.lock();
        if sessions
            .get(handle.pod_uid())
            .is_some_and(|current| current.is_same(handle))
        {
            sessions.remove(handle.pod_uid());
            debug!(
                pod_uid = %handle.pod_uid(),
                session_id = %handle.id(),
                "migration session removed"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WorkloadUid, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
