//! Inbound HTTP surface of the migration agent.

pub mod body;
pub mod handler;
pub mod http;

pub use handler::AppState;
pub use http::{router, serve, serve_with_listener};
