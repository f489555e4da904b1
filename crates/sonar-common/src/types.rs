//! Domain primitive types used across the Sonar stack workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SonarError};

/// Template-level identifier of a declared resource.
///
/// Logical ids are alphanumeric; construct ids such as `/app/sonarDBUser`
/// are sanitized into `appsonarDBUser`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalId(String);

impl LogicalId {
    /// Creates a logical id from a construct id, dropping every
    /// non-alphanumeric character.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing alphanumeric remains.
    pub fn from_construct_id(construct_id: &str) -> Result<Self> {
        let sanitized: String = construct_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if sanitized.is_empty() {
            return Err(SonarError::Config {
                message: format!("construct id {construct_id:?} has no alphanumeric characters"),
            });
        }
        Ok(Self(sanitized))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a stack (e.g. `sonar`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(String);

impl StackId {
    /// Creates a stack id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or contains characters other than
    /// ASCII alphanumerics and `-`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SonarError::Config {
                message: format!("invalid stack id: {id:?}"),
            });
        }
        Ok(Self(id))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this stack's synthesized template.
    #[must_use]
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.0)
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Isolated virtual network.
    Network,
    /// Generated database credential.
    Credential,
    /// Network security policy.
    SecurityPolicy,
    /// Managed relational database cluster.
    DatabaseCluster,
    /// Container-orchestration capacity pool.
    ComputeCluster,
    /// Permission role assumed by running tasks.
    ExecutionIdentity,
    /// Load-balanced container service.
    Service,
    /// Per-container OS resource limits attached to a service.
    ContainerLimits,
}

impl ResourceKind {
    /// Template resource type emitted for this kind.
    #[must_use]
    pub const fn template_type(self) -> &'static str {
        match self {
            Self::Network => "Sonar::Network::VirtualNetwork",
            Self::Credential => "Sonar::Secrets::GeneratedCredential",
            Self::SecurityPolicy => "Sonar::Network::SecurityPolicy",
            Self::DatabaseCluster => "Sonar::Database::Cluster",
            Self::ComputeCluster => "Sonar::Compute::Cluster",
            Self::ExecutionIdentity => "Sonar::Identity::ExecutionRole",
            Self::Service => "Sonar::Compute::LoadBalancedService",
            Self::ContainerLimits => "Sonar::Compute::ContainerLimits",
        }
    }

    /// Human-readable kind name used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Credential => "credential",
            Self::SecurityPolicy => "security policy",
            Self::DatabaseCluster => "database cluster",
            Self::ComputeCluster => "compute cluster",
            Self::ExecutionIdentity => "execution identity",
            Self::Service => "service",
            Self::ContainerLimits => "container limits",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Transport protocol of an ingress rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// SHA-256 fingerprint of a synthesized artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a hash from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != crate::constants::SHA256_HEX_LENGTH
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(SonarError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex))
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// Engine family of a managed database cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseEngine {
    /// Postgres-compatible Aurora.
    AuroraPostgresql,
    /// MySQL-compatible Aurora.
    AuroraMysql,
}

impl DatabaseEngine {
    /// Engine identifier understood by the provisioning engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuroraPostgresql => "aurora-postgresql",
            Self::AuroraMysql => "aurora-mysql",
        }
    }

    /// Port the engine listens on unless overridden.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::AuroraPostgresql => 5432,
            Self::AuroraMysql => 3306,
        }
    }

    /// JDBC URL scheme for clients of this engine.
    #[must_use]
    pub const fn jdbc_scheme(self) -> &'static str {
        match self {
            Self::AuroraPostgresql => "jdbc:postgresql",
            Self::AuroraMysql => "jdbc:mysql",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_id_strips_path_separators() {
        let id = LogicalId::from_construct_id("/app/sonarDBUser").expect("valid");
        assert_eq!(id.as_str(), "appsonarDBUser");
    }

    #[test]
    fn logical_id_rejects_punctuation_only() {
        assert!(LogicalId::from_construct_id("/-/").is_err());
    }

    #[test]
    fn stack_id_accepts_dashes() {
        let id = StackId::new("sonar-dev").expect("valid");
        assert_eq!(id.template_file(), "sonar-dev.template.json");
    }

    #[test]
    fn stack_id_rejects_empty_and_slashes() {
        assert!(StackId::new("").is_err());
        assert!(StackId::new("a/b").is_err());
    }

    #[test]
    fn sha256_rejects_short_input() {
        assert!(Sha256Hash::from_hex("abc").is_err());
        let ok = Sha256Hash::from_hex("a".repeat(64)).expect("valid");
        assert!(ok.to_string().starts_with("sha256:"));
    }

    #[test]
    fn postgres_engine_listens_on_5432() {
        assert_eq!(DatabaseEngine::AuroraPostgresql.default_port(), 5432);
        assert_eq!(DatabaseEngine::AuroraMysql.default_port(), 3306);
        assert_eq!(DatabaseEngine::AuroraPostgresql.jdbc_scheme(), "jdbc:postgresql");
    }

    #[test]
    fn resource_kind_maps_to_template_type() {
        assert_eq!(
            ResourceKind::Network.template_type(),
            "Sonar::Network::VirtualNetwork"
        );
        assert_eq!(ResourceKind::Service.label(), "service");
    }

    #[test]
    fn template_types_share_sonar_namespace() {
        let kinds = [
            ResourceKind::Network,
            ResourceKind::Credential,
            ResourceKind::SecurityPolicy,
            ResourceKind::DatabaseCluster,
            ResourceKind::ComputeCluster,
            ResourceKind::ExecutionIdentity,
            ResourceKind::Service,
            ResourceKind::ContainerLimits,
        ];
        for kind in kinds {
            assert!(kind.template_type().starts_with("Sonar::"), "{kind}");
        }
    }
}
