//! Global configuration parsing and validation.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::workload::WorkloadUid;
use crate::{AppError, Result};

/// Directory below `root_dir` holding per-pod checkpoint directories.
const MIGRATION_DIR: &str = "migration";

/// Upper bound for every configured timeout: one day.
pub const MAX_TIMEOUT_SECONDS: u64 = 86_400;

/// Bounded waits for the migration handshake and the trigger client.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// How long the handler waits for every checkpoint to be reported.
    #[serde(default = "default_readiness_seconds")]
    pub readiness_seconds: u64,
    /// How long a checkpoint producer waits for the release signal.
    #[serde(default = "default_release_seconds")]
    pub release_seconds: u64,
    /// Whole-request timeout applied by the trigger client.
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,
    /// Connection establishment timeout applied by the trigger client.
    #[serde(default = "default_connect_seconds")]
    pub connect_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            readiness_seconds: default_readiness_seconds(),
            release_seconds: default_release_seconds(),
            request_seconds: default_request_seconds(),
            connect_seconds: default_connect_seconds(),
        }
    }
}

impl TimeoutConfig {
    /// Readiness bound as a [`Duration`].
    #[must_use]
    pub fn readiness(&self) -> Duration {
        Duration::from_secs(self.readiness_seconds)
    }

    /// Release bound as a [`Duration`].
    #[must_use]
    pub fn release(&self) -> Duration {
        Duration::from_secs(self.release_seconds)
    }

    /// Trigger request bound as a [`Duration`].
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_seconds)
    }

    /// Trigger connect bound as a [`Duration`].
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_seconds)
    }
}

fn default_readiness_seconds() -> u64 {
    120
}

fn default_release_seconds() -> u64 {
    60
}

fn default_request_seconds() -> u64 {
    300
}

fn default_connect_seconds() -> u64 {
    10
}

/// External checkpoint command invoked once per container.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointConfig {
    /// Executable that writes a container checkpoint.
    pub command: String,
    /// Extra arguments passed before the environment-driven contract.
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional executable run once the producer has been released.
    #[serde(default)]
    pub release_command: Option<String>,
    /// Arguments passed to `release_command`.
    #[serde(default)]
    pub release_args: Vec<String>,
    /// Whether containers keep running after the checkpoint is taken.
    #[serde(default)]
    pub keep_running: bool,
}

/// Outbound trigger client settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Port the remote migration agents listen on.
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,
    /// Additional PEM trust root used to verify remote agents.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// PEM client certificate presented to remote agents.
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    /// PEM private key matching `client_cert`.
    #[serde(default)]
    pub client_key: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_port: default_agent_port(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

fn default_agent_port() -> u16 {
    10250
}

fn default_http_port() -> u16 {
    10250
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Agent state root; checkpoints land under `<root_dir>/migration`.
    pub root_dir: PathBuf,
    /// Address the migration endpoint binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Port the migration endpoint binds to.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// TOML manifest describing the pods hosted on this node.
    #[serde(default)]
    pub pods_manifest: Option<PathBuf>,
    /// Bounded waits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Checkpoint producer command.
    #[serde(default)]
    pub checkpoint: Option<CheckpointConfig>,
    /// Trigger client settings.
    #[serde(default)]
    pub client: ClientConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding one checkpoint directory per migrating pod.
    #[must_use]
    pub fn migration_dir(&self) -> PathBuf {
        self.root_dir.join(MIGRATION_DIR)
    }

    /// Checkpoint directory of the pod with `uid`: `<migration dir>/<uid>`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` if the uid is not a single plain
    /// path segment.
    pub fn checkpoint_dir(&self, uid: &WorkloadUid) -> Result<PathBuf> {
        let mut components = Path::new(uid.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == uid.as_str() => {
                Ok(self.migration_dir().join(segment))
            }
            _ => Err(AppError::InvalidRequest(format!(
                "pod uid {uid} cannot name a checkpoint directory"
            ))),
        }
    }

    /// Socket address of the migration endpoint.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }

    fn validate(&mut self) -> Result<()> {
        let timeouts = [
            ("readiness_seconds", self.timeouts.readiness_seconds),
            ("release_seconds", self.timeouts.release_seconds),
            ("request_seconds", self.timeouts.request_seconds),
            ("connect_seconds", self.timeouts.connect_seconds),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(AppError::Config(format!(
                "timeouts.{name} must be greater than zero"
            )));
        }
        if let Some((name, _)) = timeouts
            .iter()
            .find(|(_, secs)| *secs > MAX_TIMEOUT_SECONDS)
        {
            return Err(AppError::Config(format!(
                "timeouts.{name} must not exceed {MAX_TIMEOUT_SECONDS}"
            )));
        }

        if self.client.client_cert.is_some() != self.client.client_key.is_some() {
            return Err(AppError::Config(
                "client.client_cert and client.client_key must be set together".into(),
            ));
        }

        if let Some(checkpoint) = &self.checkpoint {
            if checkpoint.command.trim().is_empty() {
                return Err(AppError::Config(
                    "checkpoint.command must not be empty".into(),
                ));
            }
        }

        let canonical_root = self
            .root_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("root_dir invalid: {err}")))?;
        self.root_dir = canonical_root;

        Ok(())
    }
}
