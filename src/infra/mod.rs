//! Infrastructure adapters and runtime bootstrap.

pub mod bindings;
pub mod error;
pub mod http;
pub mod provider;
pub mod telemetry;
