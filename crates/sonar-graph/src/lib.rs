//! # sonar-graph
//!
//! Declaration layer of the Sonar stack.
//!
//! Handles:
//! - **Token**: Deferred values that only exist after provisioning.
//! - **Resource**: Typed declarations of desired infrastructure state.
//! - **Graph**: Dependency graph construction and topological resolution.
//! - **Validator**: Structural checks over a built graph.
//! - **Template**: Rendering a graph into a provisioning-engine template.

pub mod graph;
pub mod resource;
pub mod template;
pub mod token;
pub mod validator;
