//! Unified error types for the Sonar stack workspace.
//!
//! Structural defects in a resource graph (forward references, duplicate
//! logical ids, amending a sealed declaration) surface here at build time.
//! Everything else is reported by the provisioning engine, not by this code.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum SonarError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or graph shape is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A referenced resource has not been declared.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A declaration was amended after another declaration started depending on it.
    #[error("resource {id} is sealed: {dependents} declaration(s) already depend on it")]
    Sealed {
        /// Logical id of the sealed resource.
        id: String,
        /// Number of declarations depending on it.
        dependents: usize,
    },

    /// A built graph violates a structural rule.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML configuration could not be parsed.
    #[error("yaml error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SonarError>;
