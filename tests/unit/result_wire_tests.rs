//! Wire format of the migration result manifest.

use std::path::Path;

use pod_migrate::models::result::MigrationResult;

#[test]
fn encodes_pascal_case_manifest() {
    let mut result = MigrationResult::default();
    result.insert("sidecar", Path::new("/ckpt/sidecar"));
    result.insert("app", Path::new("/ckpt/app"));

    let json = serde_json::to_string(&result).expect("encode");
    assert_eq!(
        json,
        r#"{"Containers":{"app":{"CheckpointPath":"/ckpt/app"},"sidecar":{"CheckpointPath":"/ckpt/sidecar"}}}"#
    );
}

#[test]
fn decodes_manifest_from_peer() {
    let raw = r#"{"Containers":{"app":{"CheckpointPath":"/var/lib/ckpt/app"}}}"#;
    let result: MigrationResult = serde_json::from_str(raw).expect("decode");
    assert_eq!(result.len(), 1);
    assert_eq!(result.checkpoint_path("app"), Some("/var/lib/ckpt/app"));
    assert_eq!(result.checkpoint_path("sidecar"), None);
}

#[test]
fn missing_containers_key_decodes_as_empty() {
    let result: MigrationResult = serde_json::from_str("{}").expect("decode");
    assert!(result.is_empty());
}

#[test]
fn snake_case_fields_are_not_the_wire_format() {
    let raw = r#"{"Containers":{"app":{"checkpoint_path":"/ckpt/app"}}}"#;
    assert!(serde_json::from_str::<MigrationResult>(raw).is_err());
}

#[test]
fn reinserting_a_container_overwrites_its_path() {
    let mut result = MigrationResult::default();
    result.insert("app", Path::new("/old"));
    result.insert("app", Path::new("/new"));
    assert_eq!(result.len(), 1);
    assert_eq!(result.checkpoint_path("app"), Some("/new"));
}
