//! Application layer: request arguments, the pipeline and its collaborators.

pub mod arguments;
pub mod context;
pub mod domains;
pub mod error;
pub mod models;
pub mod options;
pub mod pipeline;
pub mod repos;
pub mod response;
