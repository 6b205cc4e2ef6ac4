//! Workload (pod) records as seen by the migration agent.

use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Cluster-unique identity of a running pod instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadUid(String);

impl WorkloadUid {
    /// Wrap a raw uid string.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// The uid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkloadUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkloadUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_owned())
    }
}

impl From<String> for WorkloadUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

impl Borrow<str> for WorkloadUid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Pod lifecycle phase, spelled the way the cluster API spells it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not all containers are running yet.
    Pending,
    /// Bound to a node with all containers created.
    Running,
    /// All containers terminated successfully.
    Succeeded,
    /// All containers terminated, at least one in failure.
    Failed,
    /// State could not be obtained.
    Unknown,
}

impl Display for PodPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Pod record resolved from the node's pod manager or cluster metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Workload {
    /// Cluster-unique identity.
    pub uid: WorkloadUid,
    /// Namespace the pod lives in.
    pub namespace: String,
    /// Pod name, unique within its namespace.
    pub name: String,
    /// Current lifecycle phase.
    pub phase: PodPhase,
    /// Address of the node hosting the pod, once scheduled.
    #[serde(default)]
    pub host_ip: Option<String>,
    /// Container names in declaration order.
    #[serde(default)]
    pub containers: Vec<String>,
    /// Name of the peer pod whose containers seed this one.
    #[serde(default)]
    pub clone_pod: Option<String>,
}

impl Workload {
    /// Whether the pod is in a phase that allows checkpointing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }

    /// Whether the pod declares a container with this name.
    #[must_use]
    pub fn has_container(&self, name: &str) -> bool {
        self.containers.iter().any(|c| c == name)
    }
}
