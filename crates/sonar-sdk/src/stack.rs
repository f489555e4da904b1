//! The Sonar stack: network, database, container cluster, and service.
//!
//! [`SonarStack::build`] wires every declaration in dependency order:
//!
//! 1. network
//! 2. credential
//! 3. security policy (opens the database port)
//! 4. database cluster
//! 5. compute cluster
//! 6. host bootstrap commands
//! 7. execution identity, then its secret-read grant
//! 8. load-balanced service
//! 9. container limits on the service's primary container

use sonar_common::config::StackConfig;
use sonar_common::error::{Result, SonarError};
use sonar_common::types::StackId;
use sonar_graph::graph::{Handle, ResourceGraph};
use sonar_graph::resource::secret::{PASSWORD_FIELD, USERNAME_FIELD};
use sonar_graph::resource::{
    ComputeCluster, ContainerLimits, Credential, DatabaseCluster, ExecutionIdentity, Grant,
    IngressRule, Network, SecurityPolicy, Service, Ulimit, UlimitName,
};
use sonar_graph::template::Template;
use sonar_graph::token::Token;
use sonar_graph::validator;

/// Environment variable carrying the JDBC connection string.
pub const JDBC_URL_VAR: &str = "sonar.jdbc.url";
/// Secret variable carrying the database user name.
pub const JDBC_USERNAME_VAR: &str = "sonar.jdbc.username";
/// Secret variable carrying the database password.
pub const JDBC_PASSWORD_VAR: &str = "sonar.jdbc.password";

const SECURITY_GROUP_DESCRIPTION: &str = "Aurora Security Group";
const INGRESS_DESCRIPTION: &str = "Aurora";
const LIMITS_SUFFIX: &str = "Ulimits";

/// A stack that can be rendered into a template.
pub trait Stack {
    /// Stack identifier.
    fn id(&self) -> &StackId;

    /// Declared resources.
    fn graph(&self) -> &ResourceGraph;

    /// Renders the stack, outputs included.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn template(&self) -> Result<Template>;
}

/// The fully wired Sonar stack.
#[derive(Debug)]
pub struct SonarStack {
    id: StackId,
    graph: ResourceGraph,
    network: Handle<Network>,
    credential: Handle<Credential>,
    security_policy: Handle<SecurityPolicy>,
    database: Handle<DatabaseCluster>,
    compute: Handle<ComputeCluster>,
    identity: Handle<ExecutionIdentity>,
    service: Handle<Service>,
    container_limits: Handle<ContainerLimits>,
}

impl SonarStack {
    /// Builds the stack with the reference configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack id is invalid or the graph is malformed.
    pub fn build(id: &str) -> Result<Self> {
        Self::build_with(id, &StackConfig::default())
    }

    /// Builds the stack with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack id or configuration is invalid, or if
    /// the resulting graph fails validation.
    pub fn build_with(id: &str, config: &StackConfig) -> Result<Self> {
        let id = StackId::new(id)?;
        config.validate()?;
        tracing::info!(stack = %id, "building stack");

        let mut graph = ResourceGraph::new();

        let net = &config.network;
        let network = graph.declare(
            &net.id,
            Network::new(&net.cidr)
                .max_azs(net.max_azs)
                .subnet_cidr_mask(net.subnet_cidr_mask),
        )?;

        let db = &config.database;
        let credential = graph.declare(
            &db.secret_id,
            Credential::new(&db.master_user_name).password_length(db.password_length),
        )?;

        let port = db.listening_port();
        let security_policy = graph.declare(
            &db.security_group_id,
            SecurityPolicy::new(&network, SECURITY_GROUP_DESCRIPTION)
                .allow_all_outbound(true)
                .ingress(IngressRule {
                    source: db.ingress_source.clone(),
                    port,
                    protocol: db.ingress_protocol,
                    description: INGRESS_DESCRIPTION.into(),
                }),
        )?;

        let database = graph.declare(
            &db.id,
            DatabaseCluster::new(db.engine, &network, &credential, &db.master_user_name)
                .engine_version(&db.engine_version)
                .default_database_name(&db.database_name)
                .parameter_group(&db.parameter_group)
                .instance_type(&db.instance_type)
                .instance_count(db.instance_count)
                .port(port)
                .security_group(&security_policy),
        )?;

        let compute = graph.declare(
            &config.compute.id,
            ComputeCluster::new(&network, &config.compute.instance_type)
                .desired_capacity(config.compute.desired_capacity),
        )?;
        graph.amend(&compute, |cluster| {
            cluster
                .user_data_mut()
                .add_commands(config.compute.bootstrap_commands.iter().cloned());
        })?;

        let role = &config.identity;
        let identity = graph.declare(
            &role.id,
            role.managed_policies.iter().fold(
                ExecutionIdentity::new(&role.assumed_by).role_name(&role.role_name),
                |identity, policy| identity.managed_policy(policy),
            ),
        )?;
        graph.amend(&identity, |identity| {
            identity.grant(Grant::secret_read(&credential));
        })?;

        let jdbc_url = Token::concat([
            Token::from(format!("{}://", db.engine.jdbc_scheme())),
            database.socket_address(),
            Token::from(format!("/{}", db.database_name)),
        ]);

        let svc = &config.service;
        let service = graph.declare(
            &svc.id,
            Service::new(&compute, &svc.image)
                .cpu(svc.cpu)
                .memory_limit_mib(svc.memory_limit_mib)
                .desired_count(svc.desired_count)
                .container_port(svc.container_port)
                .listener_port(svc.listener_port)
                .public_load_balancer(svc.public_load_balancer)
                .task_role(&identity)
                .secret(JDBC_USERNAME_VAR, credential.secret_source(USERNAME_FIELD))
                .secret(JDBC_PASSWORD_VAR, credential.secret_source(PASSWORD_FIELD))
                .environment(JDBC_URL_VAR, jdbc_url),
        )?;

        let limits = {
            let declared = graph.get(&service).ok_or_else(|| SonarError::NotFound {
                kind: "service",
                id: service.id().to_string(),
            })?;
            ContainerLimits::for_primary_container(&service, declared).ulimit(Ulimit {
                name: UlimitName::Nofile,
                soft_limit: svc.nofile_soft_limit,
                hard_limit: svc.nofile_hard_limit,
            })
        };
        let container_limits = graph.declare(&format!("{}{LIMITS_SUFFIX}", svc.id), limits)?;

        validator::validate(&graph)?;
        tracing::info!(stack = %id, resources = graph.len(), "stack built");

        Ok(Self {
            id,
            graph,
            network,
            credential,
            security_policy,
            database,
            compute,
            identity,
            service,
            container_limits,
        })
    }

    /// Handle of the network.
    #[must_use]
    pub const fn network(&self) -> &Handle<Network> {
        &self.network
    }

    /// Handle of the database credential.
    #[must_use]
    pub const fn credential(&self) -> &Handle<Credential> {
        &self.credential
    }

    /// Handle of the database security policy.
    #[must_use]
    pub const fn security_policy(&self) -> &Handle<SecurityPolicy> {
        &self.security_policy
    }

    /// Handle of the database cluster.
    #[must_use]
    pub const fn database(&self) -> &Handle<DatabaseCluster> {
        &self.database
    }

    /// Handle of the compute cluster.
    #[must_use]
    pub const fn compute(&self) -> &Handle<ComputeCluster> {
        &self.compute
    }

    /// Handle of the task execution identity.
    #[must_use]
    pub const fn identity(&self) -> &Handle<ExecutionIdentity> {
        &self.identity
    }

    /// Handle of the load-balanced service.
    #[must_use]
    pub const fn service(&self) -> &Handle<Service> {
        &self.service
    }

    /// Handle of the container limits attachment.
    #[must_use]
    pub const fn container_limits(&self) -> &Handle<ContainerLimits> {
        &self.container_limits
    }
}

impl Stack for SonarStack {
    fn id(&self) -> &StackId {
        &self.id
    }

    fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    fn template(&self) -> Result<Template> {
        let mut template = Template::render(&self.graph, &self.id)?;
        let service = self.service.id();
        template.add_output(
            format!("{service}LoadBalancerDNS"),
            "DNS name of the service load balancer",
            &self.service.load_balancer_dns(),
        )?;
        template.add_output(
            format!("{service}ServiceURL"),
            "Public URL of the service",
            &self.service.url(),
        )?;
        template.add_output(
            format!("{}Endpoint", self.database.id()),
            "Writer endpoint address of the database cluster",
            &self.database.endpoint_address(),
        )?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use sonar_common::types::{Protocol, ResourceKind};
    use sonar_graph::resource::EdgeKind;

    use super::*;

    #[test]
    fn build_rejects_invalid_stack_id() {
        assert!(SonarStack::build("").is_err());
        assert!(SonarStack::build("so nar").is_err());
    }

    #[test]
    fn build_declares_every_resource_once() {
        let stack = SonarStack::build("sonar").expect("build");
        let graph = stack.graph();
        for kind in [
            ResourceKind::Network,
            ResourceKind::Credential,
            ResourceKind::SecurityPolicy,
            ResourceKind::DatabaseCluster,
            ResourceKind::ComputeCluster,
            ResourceKind::ExecutionIdentity,
            ResourceKind::Service,
            ResourceKind::ContainerLimits,
        ] {
            assert_eq!(graph.count(kind), 1, "{kind}");
        }
        assert_eq!(graph.len(), 8);
    }

    #[test]
    fn compute_cluster_is_sealed_once_service_exists() {
        let mut stack = SonarStack::build("sonar").expect("build");
        let compute = stack.compute().clone();
        let err = stack
            .graph
            .amend(&compute, |c| c.user_data_mut().add_command("late"))
            .unwrap_err();
        assert!(matches!(err, SonarError::Sealed { .. }), "got: {err}");
    }

    #[test]
    fn limits_attach_to_service() {
        let stack = SonarStack::build("sonar").expect("build");
        assert_eq!(
            stack.graph().edge_count(
                stack.container_limits().id(),
                stack.service().id(),
                EdgeKind::Attachment
            ),
            1
        );
    }

    #[test]
    fn mysql_engine_opens_mysql_port() {
        let mut config = StackConfig::default();
        config.database.engine = sonar_common::types::DatabaseEngine::AuroraMysql;
        let stack = SonarStack::build_with("sonar", &config).expect("build");
        let policy = stack
            .graph()
            .get(stack.security_policy())
            .expect("policy");
        assert!(policy.allows_port(Protocol::Tcp, 3306));
        let url = stack
            .graph()
            .get(stack.service())
            .expect("service")
            .environment_variables()[JDBC_URL_VAR]
            .to_string();
        assert!(url.starts_with("jdbc:mysql://"), "got: {url}");
    }

    #[test]
    fn template_exposes_outputs() {
        let stack = SonarStack::build("sonar").expect("build");
        let template = stack.template().expect("template");
        assert_eq!(template.outputs.len(), 3);
        assert!(template.outputs.contains_key("SonarServiceServiceURL"));
        assert!(template.outputs.contains_key("DatabaseEndpoint"));
    }
}
