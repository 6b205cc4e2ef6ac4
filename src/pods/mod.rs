//! Pod metadata collaborators.
//!
//! [`PodManager`] answers "which pods run on this node" for the inbound
//! handler. [`PodLookup`] resolves peer pods by namespace and name for the
//! trigger client. [`registry::PodRegistry`] implements both from a TOML
//! manifest.

pub mod registry;
pub mod watcher;

use std::future::Future;
use std::pin::Pin;

use crate::models::workload::{Workload, WorkloadUid};
use crate::Result;

/// Node-local pod source consulted by the migration handler.
pub trait PodManager: Send + Sync {
    /// Resolve a pod hosted on this node by uid.
    fn pod_by_uid(&self, uid: &WorkloadUid) -> Option<Workload>;
}

/// Cluster metadata source used to find the counterpart of a pod.
pub trait PodLookup: Send + Sync {
    /// Resolve a pod by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Lookup`](crate::AppError::Lookup) if the pod does
    /// not exist or the metadata source is unreachable.
    fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Workload>> + Send + '_>>;
}
