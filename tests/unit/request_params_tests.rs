use pod_migrate::models::request::{is_valid_container_name, MigrationRequestParams};
use pod_migrate::models::workload::{PodPhase, Workload, WorkloadUid};
use pod_migrate::AppError;

fn pod(containers: &[&str]) -> Workload {
    Workload {
        uid: WorkloadUid::new("uid-1"),
        namespace: "default".into(),
        name: "web".into(),
        phase: PodPhase::Running,
        host_ip: None,
        containers: containers.iter().map(|c| (*c).to_owned()).collect(),
        clone_pod: None,
    }
}

#[test]
fn no_filter_selects_every_container_in_order() {
    let params = MigrationRequestParams::new("uid-1", None);
    let resolved = params
        .resolve_containers(&pod(&["app", "sidecar", "log-shipper"]))
        .expect("resolves");
    assert_eq!(resolved, vec!["app", "sidecar", "log-shipper"]);
}

#[test]
fn empty_query_value_selects_every_container() {
    let params = MigrationRequestParams::new("uid-1", Some(""));
    let resolved = params.resolve_containers(&pod(&["app"])).expect("resolves");
    assert_eq!(resolved, vec!["app"]);
}

#[test]
fn filter_keeps_requested_order() {
    let params = MigrationRequestParams::new("uid-1", Some("sidecar,app"));
    let resolved = params
        .resolve_containers(&pod(&["app", "sidecar"]))
        .expect("resolves");
    assert_eq!(resolved, vec!["sidecar", "app"]);
}

#[test]
fn foreign_container_is_rejected() {
    let params = MigrationRequestParams::new("uid-1", Some("app,db"));
    let err = params
        .resolve_containers(&pod(&["app"]))
        .expect_err("db is not in the pod");
    match err {
        AppError::InvalidRequest(msg) => assert!(msg.contains("db"), "{msg}"),
        other => panic!("expected invalid request, got {other}"),
    }
}

#[test]
fn malformed_container_name_is_rejected() {
    let params = MigrationRequestParams::new("uid-1", Some("../../etc"));
    let err = params
        .resolve_containers(&pod(&["app"]))
        .expect_err("path-like name");
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[test]
fn pod_without_containers_cannot_be_migrated() {
    let params = MigrationRequestParams::new("uid-1", None);
    let err = params.resolve_containers(&pod(&[])).expect_err("no containers");
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[test]
fn name_validation_limits() {
    assert!(is_valid_container_name("a"));
    assert!(is_valid_container_name(&"a".repeat(63)));
    assert!(!is_valid_container_name(""));
    assert!(!is_valid_container_name("app-"));
    assert!(!is_valid_container_name("app_1"));
    assert!(!is_valid_container_name("app,sidecar"));
}
