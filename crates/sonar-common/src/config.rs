//! Stack configuration model.
//!
//! [`StackConfig::default`] is the reference configuration of the Sonar
//! stack. Every section is `#[serde(default)]`, so a YAML override only
//! needs to name the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SonarError};
use crate::types::{DatabaseEngine, Protocol};

/// Root configuration for the Sonar stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Virtual network settings.
    pub network: NetworkConfig,
    /// Database cluster and credential settings.
    pub database: DatabaseConfig,
    /// Container host capacity settings.
    pub compute: ComputeConfig,
    /// Task execution identity settings.
    pub identity: IdentityConfig,
    /// Load-balanced service settings.
    pub service: ServiceConfig,
}

impl StackConfig {
    /// Parses a configuration override from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or fails validation.
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration override from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading stack configuration");
        let content = std::fs::read_to_string(path).map_err(|e| SonarError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Checks values the declaration layer would otherwise pass through blindly.
    ///
    /// Only shape errors that make the graph itself meaningless are rejected
    /// here; sizing and naming are left to the provisioning engine.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.network.max_azs == 0 {
            return Err(config_err("network.max_azs must be at least 1"));
        }
        if self.database.instance_count == 0 {
            return Err(config_err("database.instance_count must be at least 1"));
        }
        if self.service.nofile_soft_limit > self.service.nofile_hard_limit {
            return Err(config_err(format!(
                "service nofile soft limit {} exceeds hard limit {}",
                self.service.nofile_soft_limit, self.service.nofile_hard_limit
            )));
        }
        Ok(())
    }
}

fn config_err(message: impl Into<String>) -> SonarError {
    SonarError::Config {
        message: message.into(),
    }
}

/// Virtual network settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Construct id of the network.
    pub id: String,
    /// Address space in CIDR notation.
    pub cidr: String,
    /// Number of availability zones spanned.
    pub max_azs: u8,
    /// Prefix length of every subnet carved from the address space.
    pub subnet_cidr_mask: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: "SonarVPC".into(),
            cidr: "10.0.0.0/16".into(),
            max_azs: 3,
            subnet_cidr_mask: 24,
        }
    }
}

/// Database cluster and master credential settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Construct id of the cluster.
    pub id: String,
    /// Construct id of the generated credential.
    pub secret_id: String,
    /// Construct id of the cluster security policy.
    pub security_group_id: String,
    /// Master user name stored in the credential.
    pub master_user_name: String,
    /// Default schema created on the cluster.
    pub database_name: String,
    /// Engine family.
    pub engine: DatabaseEngine,
    /// Engine version.
    pub engine_version: String,
    /// Name of the existing parameter group the cluster uses.
    pub parameter_group: String,
    /// Instance class of every cluster member.
    pub instance_type: String,
    /// Number of cluster members.
    pub instance_count: u8,
    /// Listening port; the engine's default port when unset.
    pub port: Option<u16>,
    /// Source range allowed to reach the listening port.
    pub ingress_source: String,
    /// Protocol of the ingress rule.
    pub ingress_protocol: Protocol,
    /// Length of the generated password.
    pub password_length: u8,
}

impl DatabaseConfig {
    /// Port the cluster listens on and the security policy opens.
    #[must_use]
    pub fn listening_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            id: "Database".into(),
            secret_id: "/app/sonarDBUser".into(),
            security_group_id: "SonarQubeSG".into(),
            master_user_name: "sonar".into(),
            database_name: "sonarqube".into(),
            engine: DatabaseEngine::AuroraPostgresql,
            engine_version: "11.6".into(),
            parameter_group: "default.aurora-postgresql11".into(),
            instance_type: "db.t3.medium".into(),
            instance_count: 2,
            port: None,
            ingress_source: "0.0.0.0/0".into(),
            ingress_protocol: Protocol::Tcp,
            password_length: 30,
        }
    }
}

/// Container host capacity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Construct id of the cluster.
    pub id: String,
    /// Host instance type.
    pub instance_type: String,
    /// Desired number of hosts.
    pub desired_capacity: u32,
    /// Commands run on every host at boot, in order.
    pub bootstrap_commands: Vec<String>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            id: "SonarCluster".into(),
            instance_type: "m5.large".into(),
            desired_capacity: 1,
            bootstrap_commands: vec![
                "sysctl -qw vm.max_map_count=262144".into(),
                "sysctl -w fs.file-max=65536".into(),
                "ulimit -n 65536".into(),
                "ulimit -u 4096".into(),
            ],
        }
    }
}

/// Execution identity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Construct id of the role.
    pub id: String,
    /// Physical role name.
    pub role_name: String,
    /// Service principal allowed to assume the role.
    pub assumed_by: String,
    /// Managed policies attached to the role.
    pub managed_policies: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id: "SonarTaskRole".into(),
            role_name: "SonarTaskRole".into(),
            assumed_by: "ecs-tasks.amazonaws.com".into(),
            managed_policies: vec!["service-role/AmazonECSTaskExecutionRolePolicy".into()],
        }
    }
}

/// Load-balanced service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Construct id of the service.
    pub id: String,
    /// Container image reference.
    pub image: String,
    /// CPU units reserved for the task.
    pub cpu: u32,
    /// Hard memory limit of the container in MiB.
    pub memory_limit_mib: u32,
    /// Desired number of running tasks.
    pub desired_count: u32,
    /// Port the container listens on.
    pub container_port: u16,
    /// Port the load balancer listener accepts traffic on.
    pub listener_port: u16,
    /// Whether the load balancer is internet-facing.
    pub public_load_balancer: bool,
    /// Soft limit on open file descriptors per container.
    pub nofile_soft_limit: u64,
    /// Hard limit on open file descriptors per container.
    pub nofile_hard_limit: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: "SonarService".into(),
            image: "sonarqube:8.2-community".into(),
            cpu: 512,
            memory_limit_mib: 2048,
            desired_count: 1,
            container_port: 9000,
            listener_port: 80,
            public_load_balancer: true,
            nofile_soft_limit: 65536,
            nofile_hard_limit: 65536,
        }
    }
}
