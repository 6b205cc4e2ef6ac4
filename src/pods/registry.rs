//! In-memory pod registry fed from a TOML manifest.
//!
//! ```toml
//! [[pods]]
//! uid = "3f6c0d2e-..."
//! namespace = "default"
//! name = "web"
//! phase = "Running"
//! host_ip = "10.0.0.12"
//! containers = ["app", "sidecar"]
//! clone_pod = "web-clone"
//! ```

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

use serde::Deserialize;
use tracing::info;

use crate::models::workload::{PodPhase, Workload, WorkloadUid};
use crate::pods::{PodLookup, PodManager};
use crate::{AppError, Result};

#[derive(Debug, Deserialize)]
struct PodManifest {
    #[serde(default)]
    pods: Vec<Workload>,
}

/// Pods known to this node, keyed by uid.
#[derive(Debug, Default)]
pub struct PodRegistry {
    pods: RwLock<HashMap<WorkloadUid, Workload>>,
}

impl PodRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `pods`.
    #[must_use]
    pub fn with_pods(pods: impl IntoIterator<Item = Workload>) -> Self {
        let registry = Self::new();
        for pod in pods {
            registry.upsert(pod);
        }
        registry
    }

    /// Replace the registry contents with the pods listed in `path`.
    ///
    /// On error the previous contents are kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the manifest cannot be read or parsed,
    /// or lists the same uid twice.
    pub fn load_manifest(&self, path: &Path) -> Result<usize> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read pod manifest {}: {err}", path.display()))
        })?;
        self.load_manifest_str(&raw)
    }

    /// Replace the registry contents with the pods listed in `raw` TOML.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on invalid TOML or duplicate uids.
    pub fn load_manifest_str(&self, raw: &str) -> Result<usize> {
        let manifest: PodManifest = toml::from_str(raw)?;
        let mut pods = HashMap::with_capacity(manifest.pods.len());
        for pod in manifest.pods {
            let uid = pod.uid.clone();
            if pods.insert(uid.clone(), pod).is_some() {
                return Err(AppError::Config(format!(
                    "pod manifest lists uid {uid} more than once"
                )));
            }
        }

        let count = pods.len();
        *self.pods.write().unwrap_or_else(PoisonError::into_inner) = pods;
        info!(pods = count, "pod manifest loaded");
        Ok(count)
    }

    /// Insert or replace a pod record.
    pub fn upsert(&self, pod: Workload) {
        self.pods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pod.uid.clone(), pod);
    }

    /// Remove a pod record. Unknown uids are ignored.
    pub fn remove(&self, uid: &str) {
        self.pods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
    }

    /// Update the phase of a known pod. Returns `false` for unknown uids.
    pub fn set_phase(&self, uid: &str, phase: PodPhase) -> bool {
        let mut pods = self.pods.write().unwrap_or_else(PoisonError::into_inner);
        match pods.get_mut(uid) {
            Some(pod) => {
                pod.phase = phase;
                true
            }
            None => false,
        }
    }

    /// Number of known pods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pods.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a pod by namespace and name.
    #[must_use]
    pub fn find_by_name(&self, namespace: &str, name: &str) -> Option<Workload> {
        self.pods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|pod| pod.namespace == namespace && pod.name == name)
            .cloned()
    }
}

impl PodManager for PodRegistry {
    fn pod_by_uid(&self, uid: &WorkloadUid) -> Option<Workload> {
        self.pods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uid)
            .cloned()
    }
}

impl PodLookup for PodRegistry {
    fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Workload>> + Send + '_>> {
        let found = self.find_by_name(namespace, name);
        let key = format!("{namespace}/{name}");
        Box::pin(async move {
            found.ok_or_else(|| AppError::Lookup(format!("pod {key} not found")))
        })
    }
}
