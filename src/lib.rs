#![forbid(unsafe_code)]

//! Live migration coordinator for running pods.
//!
//! The target-side agent accepts `GET /migrate/{uid}` requests, asks a
//! checkpoint producer to snapshot the pod's containers, and answers with
//! the artifact manifest once every checkpoint exists. The initiator side
//! drives this through [`client::trigger::TriggerClient`].

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod errors;
pub mod migration;
pub mod models;
pub mod pods;
pub mod server;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
