//! Structural validation of a built resource graph.
//!
//! Checks for dangling references, cycles, unopened database ports,
//! secrets leaking into plain environment variables, and misdirected
//! container limits before the graph is rendered.

use sonar_common::error::{Result, SonarError};
use sonar_common::types::{Protocol, ResourceKind};

use crate::graph::ResourceGraph;
use crate::resource::{
    ContainerLimits, DatabaseCluster, Declared, ExecutionIdentity, SecurityPolicy, Service,
};

/// Validates a built graph for structural correctness.
///
/// # Checks performed
///
/// 1. Every reference resolves to a declared resource.
/// 2. The graph is acyclic.
/// 3. Every security policy attached to a database cluster admits TCP
///    traffic on the cluster's listening port.
/// 4. No service environment variable embeds a secret field; secrets go
///    through the service's secrets map.
/// 5. Every service's task role is an execution identity allowed to read
///    each secret the service injects.
/// 6. Container limits target a service's primary container and keep each
///    soft limit at or below its hard limit.
///
/// # Errors
///
/// Returns an error describing the first failed check.
pub fn validate(graph: &ResourceGraph) -> Result<()> {
    tracing::info!(resources = graph.len(), "validating resource graph");
    check_references(graph)?;
    let _ = graph.deployment_order()?;
    check_database_ports(graph)?;
    check_secret_leaks(graph)?;
    check_task_roles(graph)?;
    check_container_limits(graph)?;
    Ok(())
}

fn validation_err(message: String) -> SonarError {
    SonarError::Validation { message }
}

fn check_references(graph: &ResourceGraph) -> Result<()> {
    for node in graph.nodes() {
        for reference in node.declaration.references() {
            if !graph.contains(&reference.target) {
                return Err(SonarError::NotFound {
                    kind: "resource",
                    id: format!("\"{}\" (referenced by \"{}\")", reference.target, node.id),
                });
            }
        }
    }
    Ok(())
}

fn lookup<'g, R: Declared>(
    graph: &'g ResourceGraph,
    id: &sonar_common::types::LogicalId,
) -> Option<&'g R> {
    graph.node(id).and_then(|n| R::downcast(&n.declaration))
}

fn check_database_ports(graph: &ResourceGraph) -> Result<()> {
    for (cluster_id, cluster) in graph.declarations::<DatabaseCluster>() {
        let port = cluster.listening_port();
        for group_id in cluster.security_groups() {
            let policy = lookup::<SecurityPolicy>(graph, group_id).ok_or_else(|| {
                validation_err(format!(
                    "\"{group_id}\" attached to \"{cluster_id}\" is not a {}",
                    ResourceKind::SecurityPolicy
                ))
            })?;
            if !policy.allows_port(Protocol::Tcp, port) {
                return Err(validation_err(format!(
                    "security policy \"{group_id}\" does not open {} port {port} \
                     of database cluster \"{cluster_id}\"",
                    Protocol::Tcp
                )));
            }
        }
    }
    Ok(())
}

fn check_secret_leaks(graph: &ResourceGraph) -> Result<()> {
    for (service_id, service) in graph.declarations::<Service>() {
        for (name, value) in service.environment_variables() {
            if value.contains_secret() {
                return Err(validation_err(format!(
                    "environment variable \"{name}\" of service \"{service_id}\" \
                     embeds a secret; inject it as a secret instead"
                )));
            }
        }
    }
    Ok(())
}

fn check_task_roles(graph: &ResourceGraph) -> Result<()> {
    for (service_id, service) in graph.declarations::<Service>() {
        let Some(role_id) = service.task_role_id() else {
            continue;
        };
        let role = lookup::<ExecutionIdentity>(graph, role_id).ok_or_else(|| {
            validation_err(format!(
                "task role \"{role_id}\" of service \"{service_id}\" is not an {}",
                ResourceKind::ExecutionIdentity
            ))
        })?;
        for (name, source) in service.secrets() {
            if !role.can_read_secret(source.secret()) {
                return Err(validation_err(format!(
                    "task role \"{role_id}\" cannot read secret \"{}\" \
                     injected as \"{name}\" into \"{service_id}\"",
                    source.secret()
                )));
            }
        }
    }
    Ok(())
}

fn check_container_limits(graph: &ResourceGraph) -> Result<()> {
    for (limits_id, limits) in graph.declarations::<ContainerLimits>() {
        let service = lookup::<Service>(graph, limits.service()).ok_or_else(|| {
            validation_err(format!(
                "\"{}\" targeted by \"{limits_id}\" is not a {}",
                limits.service(),
                ResourceKind::Service
            ))
        })?;
        if limits.container() != service.primary_container() {
            return Err(validation_err(format!(
                "\"{limits_id}\" targets unknown container \"{}\" of \"{}\"",
                limits.container(),
                limits.service()
            )));
        }
        if let Some(bad) = limits.ulimits().iter().find(|u| u.soft_limit > u.hard_limit) {
            return Err(validation_err(format!(
                "\"{limits_id}\": {} soft limit {} exceeds hard limit {}",
                bad.name, bad.soft_limit, bad.hard_limit
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sonar_common::types::DatabaseEngine;

    use super::*;
    use crate::graph::Handle;
    use crate::resource::{
        ComputeCluster, Credential, Grant, IngressRule, Network, Ulimit, UlimitName,
    };

    struct Base {
        graph: ResourceGraph,
        vpc: Handle<Network>,
        secret: Handle<Credential>,
    }

    fn base() -> Base {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare("VPC", Network::new("10.0.0.0/16"))
            .expect("vpc");
        let secret = graph
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");
        Base { graph, vpc, secret }
    }

    fn database_with_rule(rule: IngressRule) -> ResourceGraph {
        let Base {
            mut graph,
            vpc,
            secret,
        } = base();
        let sg = graph
            .declare(
                "SG",
                SecurityPolicy::new(&vpc, "db").ingress(rule),
            )
            .expect("sg");
        let _ = graph
            .declare(
                "Database",
                DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "sonar")
                    .security_group(&sg),
            )
            .expect("db");
        graph
    }

    #[test]
    fn validate_empty_graph_succeeds() {
        assert!(validate(&ResourceGraph::new()).is_ok());
    }

    fn database_with_port(ingress_port: u16) -> ResourceGraph {
        database_with_rule(IngressRule::tcp_from_anywhere(ingress_port, "db"))
    }

    #[test]
    fn validate_matching_database_port_succeeds() {
        assert!(validate(&database_with_port(5432)).is_ok());
    }

    #[test]
    fn validate_mismatched_database_port_fails() {
        let err = validate(&database_with_port(3306)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("does not open tcp port 5432"), "got: {msg}");
    }

    #[test]
    fn validate_udp_rule_on_database_port_fails() {
        let graph = database_with_rule(IngressRule {
            protocol: Protocol::Udp,
            ..IngressRule::tcp_from_anywhere(5432, "db")
        });
        let err = validate(&graph).unwrap_err();
        assert!(err.to_string().contains("does not open tcp port 5432"), "got: {err}");
    }

    #[test]
    fn validate_secret_in_environment_fails() {
        let Base {
            mut graph,
            vpc,
            secret,
        } = base();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let _ = graph
            .declare(
                "Svc",
                Service::new(&cluster, "img").environment("PASSWORD", secret.field("password")),
            )
            .expect("service");
        let err = validate(&graph).unwrap_err();
        assert!(err.to_string().contains("embeds a secret"), "got: {err}");
    }

    #[test]
    fn validate_task_role_without_secret_grant_fails() {
        let Base {
            mut graph,
            vpc,
            secret,
        } = base();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let role = graph
            .declare("Role", ExecutionIdentity::new("ecs-tasks.amazonaws.com"))
            .expect("role");
        let _ = graph
            .declare(
                "Svc",
                Service::new(&cluster, "img")
                    .task_role(&role)
                    .secret("PASSWORD", secret.secret_source("password")),
            )
            .expect("service");
        let err = validate(&graph).unwrap_err();
        assert!(err.to_string().contains("cannot read secret"), "got: {err}");
    }

    #[test]
    fn validate_granted_task_role_succeeds() {
        let Base {
            mut graph,
            vpc,
            secret,
        } = base();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let role = graph
            .declare("Role", ExecutionIdentity::new("ecs-tasks.amazonaws.com"))
            .expect("role");
        graph
            .amend(&role, |r| r.grant(Grant::secret_read(&secret)))
            .expect("grant");
        let _ = graph
            .declare(
                "Svc",
                Service::new(&cluster, "img")
                    .task_role(&role)
                    .secret("PASSWORD", secret.secret_source("password")),
            )
            .expect("service");
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn validate_inverted_ulimit_fails() {
        let Base { mut graph, vpc, .. } = base();
        let cluster = graph
            .declare("Cluster", ComputeCluster::new(&vpc, "m5.large"))
            .expect("cluster");
        let service = Service::new(&cluster, "img");
        let handle = graph.declare("Svc", service.clone()).expect("service");
        let _ = graph
            .declare(
                "Limits",
                ContainerLimits::for_primary_container(&handle, &service).ulimit(Ulimit {
                    name: UlimitName::Nofile,
                    soft_limit: 10,
                    hard_limit: 5,
                }),
            )
            .expect("limits");
        let err = validate(&graph).unwrap_err();
        assert!(err.to_string().contains("exceeds hard limit"), "got: {err}");
    }
}
