//! Infrastructure adapters and runtime bootstrap.

pub mod access;
pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;
