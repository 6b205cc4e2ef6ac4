//! Migration session coordination.
//!
//! A [`session::MigrationSession`] is held by the request handler and a
//! matching [`session::CheckpointProducer`] is handed to the checkpoint
//! machinery. The producer reports one artifact per container; the handler
//! collects them, answers the caller, and only then releases the producer.
//! The [`store::SessionStore`] guarantees at most one in-flight session per
//! pod.

pub mod options;
pub mod session;
pub mod store;

pub use options::MigratePodOptions;
pub use session::{
    CheckpointArtifact, CheckpointProducer, MigrationSession, ReleaseReason, SessionHandle,
    SessionPhase, SessionSummary,
};
pub use store::SessionStore;
