//! Runtime options handed to the checkpoint machinery.

use std::path::PathBuf;

use serde::Serialize;

/// What the container runtime needs to know to checkpoint a pod.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MigratePodOptions {
    /// Leave containers running after the checkpoint is taken.
    pub keep_running: bool,
    /// Directory receiving one checkpoint per container.
    pub checkpoints_dir: PathBuf,
    /// Containers to checkpoint, in order.
    pub containers: Vec<String>,
}

impl MigratePodOptions {
    /// Artifact location for `container` below the checkpoint directory.
    #[must_use]
    pub fn checkpoint_path(&self, container: &str) -> PathBuf {
        self.checkpoints_dir.join(container)
    }
}
