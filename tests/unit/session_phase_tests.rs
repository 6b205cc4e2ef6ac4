use pod_migrate::migration::{ReleaseReason, SessionPhase};

const ALL: [SessionPhase; 5] = [
    SessionPhase::Created,
    SessionPhase::AwaitingReadiness,
    SessionPhase::Ready,
    SessionPhase::Released,
    SessionPhase::Closed,
];

#[test]
fn happy_path_transitions_are_allowed() {
    assert!(SessionPhase::Created.can_transition_to(SessionPhase::AwaitingReadiness));
    assert!(SessionPhase::AwaitingReadiness.can_transition_to(SessionPhase::Ready));
    assert!(SessionPhase::Ready.can_transition_to(SessionPhase::Released));
    assert!(SessionPhase::Released.can_transition_to(SessionPhase::Closed));
}

#[test]
fn early_release_is_allowed() {
    assert!(SessionPhase::Created.can_transition_to(SessionPhase::Released));
    assert!(SessionPhase::AwaitingReadiness.can_transition_to(SessionPhase::Released));
}

#[test]
fn closed_is_terminal() {
    for next in ALL {
        assert!(
            !SessionPhase::Closed.can_transition_to(next),
            "Closed -> {next:?} must be rejected"
        );
    }
}

#[test]
fn no_phase_transitions_to_itself() {
    for phase in ALL {
        assert!(!phase.can_transition_to(phase), "{phase:?} -> {phase:?}");
    }
}

#[test]
fn ready_cannot_be_skipped_or_revisited() {
    assert!(!SessionPhase::Created.can_transition_to(SessionPhase::Ready));
    assert!(!SessionPhase::Released.can_transition_to(SessionPhase::Ready));
    assert!(!SessionPhase::Ready.can_transition_to(SessionPhase::AwaitingReadiness));
}

#[test]
fn closing_requires_release_first() {
    for phase in [
        SessionPhase::Created,
        SessionPhase::AwaitingReadiness,
        SessionPhase::Ready,
    ] {
        assert!(!phase.can_transition_to(SessionPhase::Closed), "{phase:?}");
    }
}

#[test]
fn phases_serialize_snake_case() {
    let json = serde_json::to_string(&SessionPhase::AwaitingReadiness).expect("encode");
    assert_eq!(json, r#""awaiting_readiness""#);
}

#[test]
fn release_reasons_have_stable_names() {
    assert_eq!(ReleaseReason::Delivered.to_string(), "delivered");
    assert_eq!(ReleaseReason::Disconnected.as_str(), "disconnected");
    assert_eq!(ReleaseReason::Abandoned.as_str(), "abandoned");
}
