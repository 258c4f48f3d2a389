//! rfpkb-core
//!
//! Shared vocabulary of the knowledge engine: domain types, collaborator
//! traits, the error taxonomy, configuration and the pure similarity
//! primitives every other crate builds on.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;
