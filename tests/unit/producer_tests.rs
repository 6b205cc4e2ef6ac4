//! Producer half of the migration handshake.

use std::path::PathBuf;
use std::time::Duration;

use pod_migrate::migration::{
    CheckpointProducer, MigrationSession, ReleaseReason, SessionPhase, SessionStore,
};
use pod_migrate::models::workload::WorkloadUid;
use pod_migrate::AppError;

fn open(containers: &[&str]) -> (SessionStore, MigrationSession, CheckpointProducer) {
    let store = SessionStore::new();
    let (session, producer) = store
        .create(
            WorkloadUid::new("pod-1"),
            "web",
            containers.iter().map(|c| (*c).to_owned()).collect(),
            PathBuf::from("/var/lib/pod-migrate/migration/pod-1"),
        )
        .expect("session created");
    session.begin().expect("begin");
    (store, session, producer)
}

#[test]
fn checkpoint_path_is_below_session_dir() {
    let (_store, _session, producer) = open(&["app"]);
    assert_eq!(
        producer.checkpoint_path("app"),
        PathBuf::from("/var/lib/pod-migrate/migration/pod-1/app")
    );
    let options = producer.options(true);
    assert!(options.keep_running);
    assert_eq!(options.containers, vec!["app".to_owned()]);
    assert_eq!(options.checkpoint_path("app"), producer.checkpoint_path("app"));
}

#[test]
fn pending_shrinks_as_artifacts_are_reported() {
    let (_store, _session, mut producer) = open(&["app", "sidecar"]);
    assert_eq!(producer.pending(), vec!["app", "sidecar"]);

    producer.artifact_created("sidecar", "/ckpt/sidecar").expect("report");
    assert_eq!(producer.pending(), vec!["app"]);
}

#[test]
fn unknown_container_is_protocol_error() {
    let (_store, _session, mut producer) = open(&["app"]);
    let err = producer
        .artifact_created("db", "/ckpt/db")
        .expect_err("db is not part of the session");
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn duplicate_report_is_protocol_error() {
    let (_store, _session, mut producer) = open(&["app", "sidecar"]);
    producer.artifact_created("app", "/ckpt/app").expect("first report");
    let err = producer
        .artifact_created("app", "/ckpt/app-again")
        .expect_err("second report");
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn report_after_handler_left_is_abandoned() {
    let (store, session, mut producer) = open(&["app"]);
    drop(session);
    assert!(store.is_empty());

    let err = producer
        .artifact_created("app", "/ckpt/app")
        .expect_err("handler is gone");
    assert!(matches!(err, AppError::Abandoned(_)));
}

#[tokio::test]
async fn explicit_release_reaches_producer() {
    let (_store, mut session, mut producer) = open(&["app"]);
    producer.artifact_created("app", "/ckpt/app").expect("report");
    session
        .wait_until_ready(Duration::from_secs(1))
        .await
        .expect("ready");
    assert_eq!(session.handle().phase(), SessionPhase::Ready);

    session.release(ReleaseReason::Delivered);
    assert!(session.is_released());
    assert_eq!(session.handle().phase(), SessionPhase::Released);

    let reason = producer
        .wait_for_release(Duration::from_secs(1))
        .await
        .expect("released");
    assert_eq!(reason, ReleaseReason::Delivered);
}

#[tokio::test]
async fn dropped_session_releases_as_abandoned() {
    let (_store, session, mut producer) = open(&["app"]);
    let handle = session.handle().clone();
    drop(session);

    let reason = producer
        .wait_for_release(Duration::from_secs(1))
        .await
        .expect("released");
    assert_eq!(reason, ReleaseReason::Abandoned);
    assert_eq!(handle.phase(), SessionPhase::Closed);
}

#[tokio::test]
async fn waiting_twice_is_protocol_error() {
    let (_store, session, mut producer) = open(&["app"]);
    drop(session);
    producer
        .wait_for_release(Duration::from_secs(1))
        .await
        .expect("first wait");

    let err = producer
        .wait_for_release(Duration::from_secs(1))
        .await
        .expect_err("second wait");
    assert!(matches!(err, AppError::Protocol(_)));
}

#[tokio::test]
async fn release_wait_is_bounded() {
    let (_store, _session, mut producer) = open(&["app"]);
    let err = producer
        .wait_for_release(Duration::from_millis(20))
        .await
        .expect_err("nobody releases");
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn dropped_producer_makes_handler_incomplete() {
    let (_store, mut session, mut producer) = open(&["app", "sidecar"]);
    producer.artifact_created("app", "/ckpt/app").expect("report");
    drop(producer);

    let err = session
        .wait_until_ready(Duration::from_secs(1))
        .await
        .expect_err("sidecar never reported");
    match err {
        AppError::Incomplete(msg) => {
            assert!(msg.contains("sidecar"), "{msg}");
            assert!(!msg.contains("app,"), "{msg}");
        }
        other => panic!("expected incomplete, got {other}"),
    }
}

#[tokio::test]
async fn readiness_wait_is_bounded() {
    let (_store, mut session, _producer) = open(&["app"]);
    let err = session
        .wait_until_ready(Duration::from_millis(20))
        .await
        .expect_err("nothing reported");
    assert!(matches!(err, AppError::Timeout(_)));
    assert_eq!(session.handle().phase(), SessionPhase::AwaitingReadiness);
}

#[tokio::test]
async fn stopped_reporting_fails_readiness_but_still_releases() {
    let (_store, mut session, mut producer) = open(&["app", "sidecar"]);
    producer.artifact_created("app", "/ckpt/app").expect("report");
    producer.stop_reporting();

    let err = session
        .wait_until_ready(Duration::from_secs(5))
        .await
        .expect_err("reporting stopped");
    assert!(matches!(err, AppError::Incomplete(_)), "{err}");

    let late = producer
        .artifact_created("sidecar", "/ckpt/sidecar")
        .expect_err("reporting stopped");
    assert!(matches!(late, AppError::Protocol(_)));

    drop(session);
    let reason = producer
        .wait_for_release(Duration::from_secs(1))
        .await
        .expect("released");
    assert_eq!(reason, ReleaseReason::Abandoned);
}

#[tokio::test]
async fn unrepresentable_readiness_bound_is_rejected() {
    let (_store, mut session, _producer) = open(&["app"]);
    let err = session
        .wait_until_ready(Duration::MAX)
        .await
        .expect_err("deadline cannot be formed");
    assert!(matches!(err, AppError::InvalidRequest(_)), "{err}");
    assert_eq!(session.handle().phase(), SessionPhase::AwaitingReadiness);
}
