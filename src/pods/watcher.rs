//! Hot-reload file watcher for the pod manifest.
//!
//! Watches the manifest's parent directory with the `notify` crate and
//! reloads the [`PodRegistry`] whenever the manifest is created, modified
//! or replaced. A manifest that fails to parse leaves the registry as it
//! was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, info_span, warn};

use crate::pods::registry::PodRegistry;
use crate::{AppError, Result};

/// Keeps the pod registry in sync with its manifest file.
///
/// Dropping the watcher stops the reloads.
pub struct ManifestWatcher {
    manifest: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ManifestWatcher {
    /// Load the manifest into `registry` and start watching it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the initial load fails or the watcher
    /// cannot be created.
    pub fn start(manifest: &Path, registry: Arc<PodRegistry>) -> Result<Self> {
        let _span = info_span!("manifest_watcher_start", manifest = %manifest.display()).entered();

        let manifest = manifest
            .canonicalize()
            .map_err(|err| AppError::Config(format!("pod manifest invalid: {err}")))?;
        registry.load_manifest(&manifest)?;

        let watch_dir = manifest
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let file_name = manifest.file_name().map(std::ffi::OsStr::to_os_string);
        let reload_path = manifest.clone();

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let relevant = is_reload_event(&event)
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref());
                    if relevant {
                        let _span =
                            info_span!("manifest_reload", manifest = %reload_path.display())
                                .entered();
                        match registry.load_manifest(&reload_path) {
                            Ok(count) => info!(pods = count, "hot-reloaded pod manifest"),
                            Err(err) => warn!(%err, "failed to reload pod manifest"),
                        }
                    }
                }
                Err(err) => warn!(%err, "file watcher error"),
            },
        )
        .map_err(|err| AppError::Config(format!("failed to create watcher: {err}")))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|err| AppError::Config(format!("failed to watch directory: {err}")))?;

        info!("watching pod manifest");
        Ok(Self {
            manifest,
            _watcher: watcher,
        })
    }

    /// Canonical path of the watched manifest.
    #[must_use]
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }
}

/// A replaced manifest shows up as a create.
fn is_reload_event(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}
