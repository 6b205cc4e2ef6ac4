use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use pod_migrate::config::{GlobalConfig, MAX_TIMEOUT_SECONDS};
use pod_migrate::models::workload::WorkloadUid;
use pod_migrate::AppError;

fn sample_toml(root: &str) -> String {
    format!(
        r#"
root_dir = '{root}'
bind_address = "127.0.0.1"
http_port = 18080
pods_manifest = "/etc/pod-migrate/pods.toml"

[timeouts]
readiness_seconds = 30
release_seconds = 15
request_seconds = 90
connect_seconds = 3

[checkpoint]
command = "/usr/local/bin/checkpoint-container"
args = ["--runtime", "runc"]
release_command = "/usr/local/bin/release-container"
keep_running = true

[client]
agent_port = 18081
ca_cert = "/etc/pod-migrate/ca.pem"
client_cert = "/etc/pod-migrate/node.pem"
client_key = "/etc/pod-migrate/node-key.pem"
"#
    )
}

fn minimal_toml(root: &str) -> String {
    format!("root_dir = '{root}'\n")
}

/// On Windows `canonicalize()` may add the `\\?\` prefix; strip it.
fn strip_unc(p: &std::path::Path) -> PathBuf {
    p.to_str()
        .and_then(|s| s.strip_prefix(r"\\?\"))
        .map_or_else(|| p.to_path_buf(), PathBuf::from)
}

#[test]
fn parses_valid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(config.http_port, 18080);
    assert_eq!(config.bind_addr().port(), 18080);
    assert_eq!(
        config.pods_manifest,
        Some(PathBuf::from("/etc/pod-migrate/pods.toml"))
    );
    assert_eq!(config.timeouts.readiness().as_secs(), 30);
    assert_eq!(config.timeouts.release().as_secs(), 15);
    assert_eq!(config.timeouts.request().as_secs(), 90);
    assert_eq!(config.timeouts.connect().as_secs(), 3);

    let checkpoint = config.checkpoint.as_ref().expect("checkpoint section");
    assert_eq!(checkpoint.args, vec!["--runtime", "runc"]);
    assert!(checkpoint.keep_running);
    assert!(checkpoint.release_args.is_empty());

    assert_eq!(config.client.agent_port, 18081);
    assert!(config.client.ca_cert.is_some());

    let expected_root = strip_unc(&temp.path().canonicalize().expect("canonicalize temp path"));
    assert_eq!(strip_unc(&config.root_dir), expected_root);
    assert_eq!(
        strip_unc(&config.migration_dir()),
        expected_root.join("migration")
    );
}

#[test]
fn minimal_config_uses_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(config.http_port, 10250);
    assert_eq!(config.timeouts.readiness_seconds, 120);
    assert_eq!(config.timeouts.release_seconds, 60);
    assert_eq!(config.timeouts.request_seconds, 300);
    assert_eq!(config.timeouts.connect_seconds, 10);
    assert_eq!(config.client.agent_port, 10250);
    assert!(config.checkpoint.is_none());
    assert!(config.pods_manifest.is_none());
}

#[test]
fn rejects_missing_root_dir() {
    let result = GlobalConfig::from_toml_str("http_port = 10250\n");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn rejects_nonexistent_root_dir() {
    let result = GlobalConfig::from_toml_str("root_dir = '/definitely/not/here/pod-migrate'\n");
    match result {
        Err(AppError::Config(msg)) => assert!(msg.contains("root_dir"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn rejects_invalid_field_type() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\nhttp_port = \"not-a-number\"\n",
        temp.path().to_str().expect("utf8")
    );

    let result = GlobalConfig::from_toml_str(&toml);
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn rejects_zero_timeout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\n[timeouts]\nreadiness_seconds = 0\n",
        temp.path().to_str().expect("utf8")
    );

    match GlobalConfig::from_toml_str(&toml) {
        Err(AppError::Config(msg)) => assert!(msg.contains("readiness_seconds"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn rejects_timeout_beyond_one_day() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\n[timeouts]\nreadiness_seconds = 9223372036854775807\n",
        temp.path().to_str().expect("utf8")
    );

    match GlobalConfig::from_toml_str(&toml) {
        Err(AppError::Config(msg)) => assert!(msg.contains("readiness_seconds"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn accepts_timeout_at_upper_bound() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\n[timeouts]\nrelease_seconds = {MAX_TIMEOUT_SECONDS}\n",
        temp.path().to_str().expect("utf8")
    );

    let config = GlobalConfig::from_toml_str(&toml).expect("config loads");
    assert_eq!(config.timeouts.release_seconds, MAX_TIMEOUT_SECONDS);
}

#[test]
fn checkpoint_dir_is_keyed_by_pod_uid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_str().expect("utf8");
    let config = GlobalConfig::from_toml_str(&minimal_toml(root)).expect("config loads");

    let dir = config
        .checkpoint_dir(&WorkloadUid::new("0f3c9a51-uid"))
        .expect("plain uid");
    assert_eq!(dir, config.migration_dir().join("0f3c9a51-uid"));
}

#[test]
fn checkpoint_dir_rejects_path_like_uids() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_str().expect("utf8");
    let config = GlobalConfig::from_toml_str(&minimal_toml(root)).expect("config loads");

    for uid in ["", ".", "..", "a/b", "../escape", "/abs", "trailing/"] {
        let result = config.checkpoint_dir(&WorkloadUid::new(uid));
        assert!(
            matches!(result, Err(AppError::InvalidRequest(_))),
            "{uid:?} gave {result:?}"
        );
    }
}

#[test]
fn rejects_client_cert_without_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\n[client]\nclient_cert = '/etc/pod-migrate/node.pem'\n",
        temp.path().to_str().expect("utf8")
    );

    let result = GlobalConfig::from_toml_str(&toml);
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn rejects_blank_checkpoint_command() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "root_dir = '{}'\n[checkpoint]\ncommand = '  '\n",
        temp.path().to_str().expect("utf8")
    );

    let result = GlobalConfig::from_toml_str(&toml);
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, minimal_toml(temp.path().to_str().expect("utf8"))).expect("write");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.http_port, 10250);
}

#[test]
fn load_from_missing_path_is_config_error() {
    let result = GlobalConfig::load_from_path("/definitely/not/here/config.toml");
    assert!(matches!(result, Err(AppError::Config(_))));
}
