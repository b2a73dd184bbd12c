//! Festival attendance surveys and peer-nominated badge awards.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
