//! Remote trigger client.
//!
//! Resolves the counterpart ("clone") of a pod, asks the agent on the
//! counterpart's node to checkpoint it, and decodes the artifact manifest.
//! The client keeps no state between calls and never retries; retry policy
//! belongs to the caller.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use reqwest::{Certificate, Client, Identity, StatusCode, Url};
use tracing::{info, info_span, Instrument};

use crate::config::{ClientConfig, TimeoutConfig};
use crate::migration::SessionSummary;
use crate::models::result::MigrationResult;
use crate::models::workload::{Workload, WorkloadUid};
use crate::pods::PodLookup;
use crate::{AppError, Result};

/// Fully resolved destination of a migration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    /// Address of the node hosting the pod.
    pub host: String,
    /// Port of the agent on that node.
    pub port: u16,
    /// Pod to checkpoint.
    pub pod_uid: WorkloadUid,
    /// Containers to checkpoint; empty means all of them.
    pub containers: Vec<String>,
}

impl MigrationTarget {
    /// Agent endpoint URL for this target.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` if the host does not form a valid URL.
    pub fn url(&self) -> Result<Url> {
        let mut url = agent_base_url(&self.host, self.port)?;
        url.path_segments_mut()
            .map_err(|()| AppError::InvalidRequest(format!("host {} cannot be a base", self.host)))?
            .pop_if_empty()
            .push("migrate")
            .push(self.pod_uid.as_str());
        if !self.containers.is_empty() {
            url.set_query(Some(&format!("containers={}", self.containers.join(","))));
        }
        Ok(url)
    }
}

/// `https://<host>:<port>/`, bracketing IPv6 literals.
fn agent_base_url(host: &str, port: u16) -> Result<Url> {
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    Url::parse(&format!("https://{authority}/"))
        .map_err(|err| AppError::InvalidRequest(format!("invalid agent host {host}: {err}")))
}

/// Issues migration requests to remote agents over verified TLS.
pub struct TriggerClient {
    http: Client,
    agent_port: u16,
    pods: Arc<dyn PodLookup>,
}

impl TriggerClient {
    /// Build a client from configuration.
    ///
    /// The optional CA certificate is added to the trust roots and the
    /// optional client certificate/key pair authenticates this node.
    /// Server certificates are always verified.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a certificate cannot be read or
    /// parsed, or the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        timeouts: &TimeoutConfig,
        pods: Arc<dyn PodLookup>,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect());

        if let Some(ca_cert) = &config.ca_cert {
            let pem = read_pem(ca_cert)?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|err| AppError::Config(format!("invalid ca_cert: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
            let mut pem = read_pem(cert)?;
            pem.push(b'\n');
            pem.extend(read_pem(key)?);
            let identity = Identity::from_pem(&pem)
                .map_err(|err| AppError::Config(format!("invalid client identity: {err}")))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            agent_port: config.agent_port,
            pods,
        })
    }

    /// Checkpoint the clone of `pod` on its node and return the manifest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` if `pod` names no clone,
    /// `AppError::Lookup` if the clone cannot be resolved or is not yet
    /// scheduled, and any error of [`TriggerClient::request_migration`].
    pub async fn trigger_pod_migration(&self, pod: &Workload) -> Result<MigrationResult> {
        let span = info_span!("trigger_migration", namespace = %pod.namespace, pod = %pod.name);
        async move {
            let target = self.resolve_target(pod).await?;
            let url = target.url()?;
            info!(
                clone_uid = %target.pod_uid,
                host = %target.host,
                containers = ?target.containers,
                "requesting remote checkpoint"
            );
            self.request_migration(url).await
        }
        .instrument(span)
        .await
    }

    /// Resolve where the clone of `pod` runs and which containers it has.
    ///
    /// # Errors
    ///
    /// See [`TriggerClient::trigger_pod_migration`].
    pub async fn resolve_target(&self, pod: &Workload) -> Result<MigrationTarget> {
        let clone_name = pod.clone_pod.as_deref().ok_or_else(|| {
            AppError::InvalidRequest(format!("pod {}/{} names no clone pod", pod.namespace, pod.name))
        })?;
        let clone = self.pods.get_pod(&pod.namespace, clone_name).await?;
        let host = clone.host_ip.clone().ok_or_else(|| {
            AppError::Lookup(format!(
                "clone pod {}/{clone_name} has no host address",
                pod.namespace
            ))
        })?;

        Ok(MigrationTarget {
            host,
            port: self.agent_port,
            pod_uid: clone.uid,
            containers: clone.containers,
        })
    }

    /// GET `url` and decode the migration manifest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` on network failure,
    /// `AppError::RemoteMigrationFailed` for any status other than `200`,
    /// and `AppError::Decode` for a malformed body.
    pub async fn request_migration(&self, url: Url) -> Result<MigrationResult> {
        let body = self.get_ok(url).await?;
        let result: MigrationResult = serde_json::from_slice(&body)
            .map_err(|err| AppError::Decode(format!("invalid migration result: {err}")))?;
        info!(containers = result.len(), "remote checkpoint complete");
        Ok(result)
    }

    /// List the sessions in flight on the agent at `host`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TriggerClient::request_migration`].
    pub async fn list_migrations(&self, host: &str) -> Result<Vec<SessionSummary>> {
        let mut url = agent_base_url(host, self.agent_port)?;
        url.set_path("/migrations");
        self.list_migrations_at(url).await
    }

    /// List the sessions in flight at an explicit `/migrations` URL.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TriggerClient::request_migration`].
    pub async fn list_migrations_at(&self, url: Url) -> Result<Vec<SessionSummary>> {
        let body = self.get_ok(url).await?;
        serde_json::from_slice(&body)
            .map_err(|err| AppError::Decode(format!("invalid migration list: {err}")))
    }

    async fn get_ok(&self, url: Url) -> Result<bytes::Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Transport(format!("request failed: {err}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::RemoteMigrationFailed {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|err| AppError::Transport(format!("failed to read response body: {err}")))
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| AppError::Config(format!("cannot read {}: {err}", path.display())))
}
