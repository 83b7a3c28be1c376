//! Side-effecting operations: config, model endpoint, prompts and the
//! sandboxed project directory.

pub mod config;
pub mod model;
pub mod model_types;
pub mod prompt;
pub mod tools;
pub mod workspace;
