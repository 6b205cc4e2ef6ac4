//! Domain model module declarations.

pub mod request;
pub mod result;
pub mod workload;
