//! Checkpoint producers.
//!
//! The migration handler does not write checkpoints itself. It hands a
//! [`CheckpointProducer`] to a [`CheckpointPreparer`], which drives the
//! container runtime, reports each artifact, and waits to be released.

pub mod command;

use std::future::Future;
use std::pin::Pin;

use crate::migration::CheckpointProducer;
use crate::models::workload::Workload;
use crate::Result;

/// Checkpoint-preparation callback invoked once per accepted request.
pub trait CheckpointPreparer: Send + Sync {
    /// Checkpoint the containers named by `producer` for `pod`.
    ///
    /// Implementations report every artifact through
    /// [`CheckpointProducer::artifact_created`] and then park in
    /// [`CheckpointProducer::wait_for_release`] before letting the containers
    /// proceed. Dropping the producer early is reported to the caller as an
    /// incomplete migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint could not be taken; the error is
    /// logged by the handler, which already answers the caller.
    fn prepare(
        &self,
        pod: Workload,
        producer: CheckpointProducer,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
