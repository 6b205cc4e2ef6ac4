//! Inbound migration request parameters.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::workload::{Workload, WorkloadUid};
use crate::{AppError, Result};

/// Container names follow the DNS-1123 label rules of the cluster API.
static CONTAINER_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

/// Longest container name the cluster API accepts.
const MAX_CONTAINER_NAME_LEN: usize = 63;

/// Parameters of a `GET /migrate/{uid}` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequestParams {
    /// Pod to migrate.
    pub pod_uid: WorkloadUid,
    /// Explicit container filter; empty means every container of the pod.
    pub container_names: Vec<String>,
}

impl MigrationRequestParams {
    /// Build parameters from the path uid and the raw `containers` query value.
    ///
    /// Names are comma separated, trimmed, and de-duplicated keeping the
    /// first occurrence. Blank entries are ignored.
    #[must_use]
    pub fn new(pod_uid: impl Into<WorkloadUid>, containers: Option<&str>) -> Self {
        let mut container_names: Vec<String> = Vec::new();
        for name in containers.unwrap_or_default().split(',').map(str::trim) {
            if !name.is_empty() && !container_names.iter().any(|n| n == name) {
                container_names.push(name.to_owned());
            }
        }
        Self {
            pod_uid: pod_uid.into(),
            container_names,
        }
    }

    /// Resolve the ordered container set to checkpoint for `pod`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` if a name is malformed or not part
    /// of the pod, or if the pod declares no containers at all.
    pub fn resolve_containers(&self, pod: &Workload) -> Result<Vec<String>> {
        if self.container_names.is_empty() {
            if pod.containers.is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "pod {} declares no containers",
                    pod.name
                )));
            }
            return Ok(pod.containers.clone());
        }

        for name in &self.container_names {
            if !is_valid_container_name(name) {
                return Err(AppError::InvalidRequest(format!(
                    "malformed container name {name:?}"
                )));
            }
            if !pod.has_container(name) {
                return Err(AppError::InvalidRequest(format!(
                    "container {name} is not part of pod {}",
                    pod.name
                )));
            }
        }
        Ok(self.container_names.clone())
    }
}

/// Check a container name against the DNS-1123 label rules.
#[must_use]
pub fn is_valid_container_name(name: &str) -> bool {
    name.len() <= MAX_CONTAINER_NAME_LEN
        && CONTAINER_NAME
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(name))
}
