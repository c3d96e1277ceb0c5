//! Domain layer types and invariants.

pub mod content;
pub mod culture;
pub mod domains;
pub mod error;
pub mod resolver;
