//! Load-balanced container service and its container limits.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};
use sonar_common::types::{LogicalId, ResourceKind};

use super::{ComputeCluster, Credential, EdgeKind, ExecutionIdentity, Reference, Resource};
use crate::graph::Handle;
use crate::token::Token;

/// Name given to the single container of a load-balanced service.
pub const PRIMARY_CONTAINER: &str = "web";

/// Attribute holding the load balancer's DNS name.
pub const LOAD_BALANCER_DNS: &str = "LoadBalancerDNS";

/// One field of a stored secret, injected into a container at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSource {
    secret: LogicalId,
    field: String,
}

impl SecretSource {
    /// Reads `field` of `secret`.
    #[must_use]
    pub fn new(secret: &Handle<Credential>, field: impl Into<String>) -> Self {
        Self {
            secret: secret.id().clone(),
            field: field.into(),
        }
    }

    /// Secret holding the field.
    #[must_use]
    pub const fn secret(&self) -> &LogicalId {
        &self.secret
    }

    /// Field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value handed to the container runtime to locate the field.
    #[must_use]
    pub fn value_from(&self) -> Token {
        Token::concat([
            Token::Ref(self.secret.clone()),
            Token::from(format!(":{}::", self.field)),
        ])
    }
}

/// A container service behind an application load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    cluster: LogicalId,
    task_role: Option<LogicalId>,
    image: String,
    cpu: Option<u32>,
    memory_limit_mib: Option<u32>,
    desired_count: u32,
    container_port: u16,
    listener_port: u16,
    public_load_balancer: bool,
    secrets: BTreeMap<String, SecretSource>,
    environment: BTreeMap<String, Token>,
}

impl Service {
    /// Creates a service on `cluster` running `image`.
    #[must_use]
    pub fn new(cluster: &Handle<ComputeCluster>, image: impl Into<String>) -> Self {
        Self {
            cluster: cluster.id().clone(),
            task_role: None,
            image: image.into(),
            cpu: None,
            memory_limit_mib: None,
            desired_count: 1,
            container_port: 80,
            listener_port: 80,
            public_load_balancer: false,
            secrets: BTreeMap::new(),
            environment: BTreeMap::new(),
        }
    }

    /// Reserves CPU units for the task.
    #[must_use]
    pub const fn cpu(mut self, units: u32) -> Self {
        self.cpu = Some(units);
        self
    }

    /// Sets the container's hard memory limit.
    #[must_use]
    pub const fn memory_limit_mib(mut self, mib: u32) -> Self {
        self.memory_limit_mib = Some(mib);
        self
    }

    /// Sets the desired number of running tasks.
    #[must_use]
    pub const fn desired_count(mut self, count: u32) -> Self {
        self.desired_count = count;
        self
    }

    /// Sets the port the container listens on.
    #[must_use]
    pub const fn container_port(mut self, port: u16) -> Self {
        self.container_port = port;
        self
    }

    /// Sets the port the load balancer listens on.
    #[must_use]
    pub const fn listener_port(mut self, port: u16) -> Self {
        self.listener_port = port;
        self
    }

    /// Sets whether the load balancer is internet-facing.
    #[must_use]
    pub const fn public_load_balancer(mut self, public: bool) -> Self {
        self.public_load_balancer = public;
        self
    }

    /// Runs tasks under `role`.
    #[must_use]
    pub fn task_role(mut self, role: &Handle<ExecutionIdentity>) -> Self {
        self.task_role = Some(role.id().clone());
        self
    }

    /// Injects one secret field under `name`.
    #[must_use]
    pub fn secret(mut self, name: impl Into<String>, source: SecretSource) -> Self {
        let _ = self.secrets.insert(name.into(), source);
        self
    }

    /// Sets an environment variable, literal or deferred.
    #[must_use]
    pub fn environment(mut self, name: impl Into<String>, value: impl Into<Token>) -> Self {
        let _ = self.environment.insert(name.into(), value.into());
        self
    }

    /// Name of the container the service runs.
    #[must_use]
    pub const fn primary_container(&self) -> &'static str {
        PRIMARY_CONTAINER
    }

    /// Role tasks run under, if any.
    #[must_use]
    pub const fn task_role_id(&self) -> Option<&LogicalId> {
        self.task_role.as_ref()
    }

    /// Injected secrets by variable name.
    #[must_use]
    pub const fn secrets(&self) -> &BTreeMap<String, SecretSource> {
        &self.secrets
    }

    /// Environment variables by name.
    #[must_use]
    pub const fn environment_variables(&self) -> &BTreeMap<String, Token> {
        &self.environment
    }
}

impl Resource for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::to(self.cluster.clone())];
        if let Some(role) = &self.task_role {
            refs.push(Reference::to(role.clone()));
        }
        refs.extend(self.secrets.values().map(|s| Reference::to(s.secret.clone())));
        for value in self.environment.values() {
            refs.extend(value.references().into_iter().cloned().map(Reference::to));
        }
        refs
    }

    fn properties(&self) -> Value {
        let environment: Vec<Value> = self
            .environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value.render() }))
            .collect();
        let secrets: Vec<Value> = self
            .secrets
            .iter()
            .map(|(name, source)| {
                json!({ "Name": name, "ValueFrom": source.value_from().render() })
            })
            .collect();

        let mut container = json!({
            "Name": PRIMARY_CONTAINER,
            "Image": self.image,
            "Essential": true,
            "PortMappings": [{ "ContainerPort": self.container_port, "Protocol": "tcp" }],
            "Environment": environment,
            "Secrets": secrets,
        });
        if let Some(mib) = self.memory_limit_mib {
            container["Memory"] = json!(mib);
        }

        let mut task = json!({
            "NetworkMode": "bridge",
            "ContainerDefinitions": [container],
        });
        if let Some(cpu) = self.cpu {
            task["Cpu"] = json!(cpu.to_string());
        }
        if let Some(role) = &self.task_role {
            task["TaskRoleArn"] = json!({ "Fn::GetAtt": [role.as_str(), "Arn"] });
        }

        json!({
            "Cluster": { "Ref": self.cluster.as_str() },
            "LaunchType": "EC2",
            "DesiredCount": self.desired_count,
            "LoadBalancer": {
                "Scheme": if self.public_load_balancer { "internet-facing" } else { "internal" },
                "Protocol": "HTTP",
                "ListenerPort": self.listener_port,
                "TargetPort": self.container_port,
            },
            "TaskDefinition": task,
        })
    }
}

impl Handle<Service> {
    /// Deferred DNS name of the service's load balancer.
    #[must_use]
    pub fn load_balancer_dns(&self) -> Token {
        self.attribute(LOAD_BALANCER_DNS)
    }

    /// Deferred public URL of the service.
    #[must_use]
    pub fn url(&self) -> Token {
        Token::concat([Token::from("http://"), self.load_balancer_dns()])
    }
}

/// OS resource a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UlimitName {
    /// Open file descriptors.
    Nofile,
}

impl fmt::Display for UlimitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nofile => write!(f, "nofile"),
        }
    }
}

/// A soft/hard limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ulimit {
    /// Limited resource.
    pub name: UlimitName,
    /// Soft limit.
    pub soft_limit: u64,
    /// Hard limit.
    pub hard_limit: u64,
}

/// OS resource limits attached to one container of a declared service.
///
/// The container is only known once the service is fully declared, so the
/// limits are a separate declaration depending on the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLimits {
    service: LogicalId,
    container: String,
    ulimits: Vec<Ulimit>,
}

impl ContainerLimits {
    /// Attaches limits to the primary container of `service`.
    #[must_use]
    pub fn for_primary_container(handle: &Handle<Service>, service: &Service) -> Self {
        Self {
            service: handle.id().clone(),
            container: service.primary_container().to_owned(),
            ulimits: Vec::new(),
        }
    }

    /// Adds a limit.
    #[must_use]
    pub fn ulimit(mut self, limit: Ulimit) -> Self {
        self.ulimits.push(limit);
        self
    }

    /// Service the limits attach to.
    #[must_use]
    pub const fn service(&self) -> &LogicalId {
        &self.service
    }

    /// Container the limits apply to.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Limits in declaration order.
    #[must_use]
    pub fn ulimits(&self) -> &[Ulimit] {
        &self.ulimits
    }
}

impl Resource for ContainerLimits {
    const KIND: ResourceKind = ResourceKind::ContainerLimits;

    fn references(&self) -> Vec<Reference> {
        vec![Reference::with_edge(self.service.clone(), EdgeKind::Attachment)]
    }

    fn properties(&self) -> Value {
        let ulimits: Vec<Value> = self
            .ulimits
            .iter()
            .map(|u| {
                json!({
                    "Name": u.name.to_string(),
                    "SoftLimit": u.soft_limit,
                    "HardLimit": u.hard_limit,
                })
            })
            .collect();
        json!({
            "Service": { "Ref": self.service.as_str() },
            "ContainerName": self.container,
            "Ulimits": ulimits,
        })
    }
}
