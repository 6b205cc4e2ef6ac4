//! Outbound side: asking a remote agent to checkpoint a pod.

pub mod trigger;

pub use trigger::{MigrationTarget, TriggerClient};
