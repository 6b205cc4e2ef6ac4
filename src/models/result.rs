//! Migration result manifest exchanged between agents.
//!
//! The field names are part of the wire contract shared with agents that
//! predate this crate, hence the `PascalCase` renames.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Checkpoint location for one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultContainer {
    /// Filesystem path or URI of the checkpoint artifact.
    #[serde(rename = "CheckpointPath")]
    pub checkpoint_path: String,
}

/// Artifact manifest keyed by container name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationResult {
    /// One entry per checkpointed container.
    #[serde(rename = "Containers", default)]
    pub containers: BTreeMap<String, ResultContainer>,
}

impl MigrationResult {
    /// Record the checkpoint path of a container.
    pub fn insert(&mut self, container: impl Into<String>, path: &Path) {
        self.containers.insert(
            container.into(),
            ResultContainer {
                checkpoint_path: path.to_string_lossy().into_owned(),
            },
        );
    }

    /// Checkpoint path reported for `container`, if any.
    #[must_use]
    pub fn checkpoint_path(&self, container: &str) -> Option<&str> {
        self.containers
            .get(container)
            .map(|c| c.checkpoint_path.as_str())
    }

    /// Number of containers in the manifest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether the manifest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
