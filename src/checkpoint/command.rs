//! Checkpoint producer backed by external commands.
//!
//! The configured checkpoint command runs once per container with the
//! migration described through environment variables:
//!
//! | Variable                     | Value                              |
//! |------------------------------|------------------------------------|
//! | `MIGRATION_POD_UID`          | pod uid                            |
//! | `MIGRATION_POD_NAMESPACE`    | pod namespace                      |
//! | `MIGRATION_POD_NAME`         | pod name                           |
//! | `MIGRATION_CONTAINER`        | container being checkpointed       |
//! | `MIGRATION_CHECKPOINT_PATH`  | checkpoint destination             |
//! | `MIGRATION_KEEP_RUNNING`     | `true` or `false`                  |
//!
//! Once every checkpoint is reported the producer waits for the release
//! and then runs the optional release command with
//! `MIGRATION_CHECKPOINT_DIR` and `MIGRATION_RELEASE_REASON` set as well.
//! A failed or timed out checkpoint stops the remaining containers, but the
//! release command still runs, with reason `abandoned`, before the failure
//! is returned.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, info_span, warn, Instrument};

use crate::checkpoint::CheckpointPreparer;
use crate::config::{CheckpointConfig, TimeoutConfig};
use crate::migration::{CheckpointProducer, MigratePodOptions, ReleaseReason};
use crate::models::workload::Workload;
use crate::{AppError, Result};

/// Runs the configured checkpoint and release commands.
#[derive(Debug, Clone)]
pub struct CommandPreparer {
    config: CheckpointConfig,
    command_timeout: Duration,
    release_timeout: Duration,
}

impl CommandPreparer {
    /// Build a preparer from the checkpoint and timeout configuration.
    ///
    /// Each checkpoint command is bounded by the readiness timeout.
    #[must_use]
    pub fn new(config: CheckpointConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            config,
            command_timeout: timeouts.readiness(),
            release_timeout: timeouts.release(),
        }
    }

    async fn run(&self, mut producer: CheckpointProducer, pod: &Workload) -> Result<()> {
        let options = producer.options(self.config.keep_running);
        let checkpointed = self.checkpoint_all(&mut producer, pod, &options).await;
        if let Err(err) = &checkpointed {
            warn!(%err, pending = ?producer.pending(), "checkpointing stopped early");
            producer.stop_reporting();
        }

        let reason = match producer.wait_for_release(self.release_timeout).await {
            Ok(reason) => reason,
            Err(err) => {
                warn!(%err, "release never arrived; proceeding as abandoned");
                ReleaseReason::Abandoned
            }
        };
        info!(%reason, "checkpoint producer released");

        let released = self.run_release_command(pod, &options, reason).await;
        match (checkpointed, released) {
            (Err(err), Err(release_err)) => {
                warn!(err = %release_err, "release command failed");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Checkpoint each container in order, stopping at the first failure.
    async fn checkpoint_all(
        &self,
        producer: &mut CheckpointProducer,
        pod: &Workload,
        options: &MigratePodOptions,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&options.checkpoints_dir)
            .await
            .map_err(|err| {
                AppError::Io(format!(
                    "failed to create checkpoint dir {}: {err}",
                    options.checkpoints_dir.display()
                ))
            })?;

        for container in &options.containers {
            let path = options.checkpoint_path(container);
            let mut cmd = Command::new(&self.config.command);
            cmd.args(&self.config.args);
            apply_env(&mut cmd, pod, container, &path, options.keep_running);
            run_bounded(cmd, &self.config.command, self.command_timeout)
                .instrument(info_span!("checkpoint_container", container = %container))
                .await?;
            info!(container = %container, path = %path.display(), "container checkpointed");
            producer.artifact_created(container, path)?;
        }
        Ok(())
    }

    async fn run_release_command(
        &self,
        pod: &Workload,
        options: &MigratePodOptions,
        reason: ReleaseReason,
    ) -> Result<()> {
        let Some(release_command) = &self.config.release_command else {
            return Ok(());
        };
        let mut cmd = Command::new(release_command);
        cmd.args(&self.config.release_args)
            .env("MIGRATION_POD_UID", pod.uid.as_str())
            .env("MIGRATION_POD_NAMESPACE", &pod.namespace)
            .env("MIGRATION_POD_NAME", &pod.name)
            .env("MIGRATION_CHECKPOINT_DIR", &options.checkpoints_dir)
            .env("MIGRATION_KEEP_RUNNING", bool_env(options.keep_running))
            .env("MIGRATION_RELEASE_REASON", reason.as_str());
        run_bounded(cmd, release_command, self.release_timeout)
            .instrument(info_span!("release_command", %reason))
            .await
    }
}

impl CheckpointPreparer for CommandPreparer {
    fn prepare(
        &self,
        pod: Workload,
        producer: CheckpointProducer,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let span = info_span!(
            "prepare_checkpoint",
            pod_uid = %pod.uid,
            session_id = %producer.handle().id(),
        );
        Box::pin(async move { self.run(producer, &pod).await }.instrument(span))
    }
}

fn apply_env(cmd: &mut Command, pod: &Workload, container: &str, path: &Path, keep_running: bool) {
    cmd.env("MIGRATION_POD_UID", pod.uid.as_str())
        .env("MIGRATION_POD_NAMESPACE", &pod.namespace)
        .env("MIGRATION_POD_NAME", &pod.name)
        .env("MIGRATION_CONTAINER", container)
        .env("MIGRATION_CHECKPOINT_PATH", path)
        .env("MIGRATION_KEEP_RUNNING", bool_env(keep_running));
}

fn bool_env(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Run `cmd` to completion, killing it if `limit` elapses.
async fn run_bounded(mut cmd: Command, program: &str, limit: Duration) -> Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|err| AppError::Checkpoint(format!("failed to spawn {program}: {err}")))?;

    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return Err(AppError::Checkpoint(format!(
                "failed waiting for {program}: {err}"
            )));
        }
        Err(_elapsed) => {
            return Err(AppError::Timeout(format!(
                "{program} did not finish within {}s",
                limit.as_secs()
            )));
        }
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::Checkpoint(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}
