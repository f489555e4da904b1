//! # sonar-common
//!
//! Shared identifiers, error definitions, configuration models, and constants
//! used across the entire Sonar stack workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the graph, SDK, and CLI
//! crates build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
