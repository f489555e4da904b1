//! Permission role assumed by running tasks.
//!
//! The trust policy (who may assume the role) and the grants (what the role
//! may do) are kept apart. Grants on declared resources become
//! [`EdgeKind::Grant`] edges in the graph.

use serde_json::{Value, json};
use sonar_common::types::{LogicalId, ResourceKind};

use super::{Credential, EdgeKind, Reference, Resource};
use crate::graph::Handle;

const POLICY_VERSION: &str = "2012-10-17";
const MANAGED_POLICY_PREFIX: &str = "arn:aws:iam::aws:policy/";
const SECRET_READ_ACTIONS: [&str; 2] = [
    "secretsmanager:GetSecretValue",
    "secretsmanager:DescribeSecret",
];

/// A permission granted to an execution identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// A provider-managed policy, referenced by name.
    ManagedPolicy {
        /// Policy name, e.g. `service-role/AmazonECSTaskExecutionRolePolicy`.
        name: String,
    },
    /// Read access to a declared secret.
    SecretRead {
        /// Secret that may be read.
        secret: LogicalId,
    },
}

impl Grant {
    /// Grants a provider-managed policy.
    #[must_use]
    pub fn managed_policy(name: impl Into<String>) -> Self {
        Self::ManagedPolicy { name: name.into() }
    }

    /// Grants read access to `secret`.
    #[must_use]
    pub fn secret_read(secret: &Handle<Credential>) -> Self {
        Self::SecretRead {
            secret: secret.id().clone(),
        }
    }
}

/// A role with a trust policy and a list of grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIdentity {
    role_name: Option<String>,
    assumed_by: String,
    grants: Vec<Grant>,
}

impl ExecutionIdentity {
    /// Creates a role assumable by `service_principal`.
    #[must_use]
    pub fn new(service_principal: impl Into<String>) -> Self {
        Self {
            role_name: None,
            assumed_by: service_principal.into(),
            grants: Vec::new(),
        }
    }

    /// Sets the physical role name.
    #[must_use]
    pub fn role_name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    /// Attaches a provider-managed policy.
    #[must_use]
    pub fn managed_policy(mut self, name: impl Into<String>) -> Self {
        self.grants.push(Grant::managed_policy(name));
        self
    }

    /// Adds a grant to an existing role.
    pub fn grant(&mut self, grant: Grant) {
        if !self.grants.contains(&grant) {
            self.grants.push(grant);
        }
    }

    /// Grants in the order they were added.
    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Service principal allowed to assume the role.
    #[must_use]
    pub fn assumed_by(&self) -> &str {
        &self.assumed_by
    }

    /// Returns `true` if the role may read `secret`.
    #[must_use]
    pub fn can_read_secret(&self, secret: &LogicalId) -> bool {
        self.grants
            .iter()
            .any(|g| matches!(g, Grant::SecretRead { secret: s } if s == secret))
    }
}

impl Resource for ExecutionIdentity {
    const KIND: ResourceKind = ResourceKind::ExecutionIdentity;

    fn references(&self) -> Vec<Reference> {
        self.grants
            .iter()
            .filter_map(|g| match g {
                Grant::SecretRead { secret } => {
                    Some(Reference::with_edge(secret.clone(), EdgeKind::Grant))
                }
                Grant::ManagedPolicy { .. } => None,
            })
            .collect()
    }

    fn properties(&self) -> Value {
        let mut managed = Vec::new();
        let mut statements = Vec::new();
        for grant in &self.grants {
            match grant {
                Grant::ManagedPolicy { name } => {
                    managed.push(json!(format!("{MANAGED_POLICY_PREFIX}{name}")));
                }
                Grant::SecretRead { secret } => statements.push(json!({
                    "Action": SECRET_READ_ACTIONS,
                    "Effect": "Allow",
                    "Resource": { "Ref": secret.as_str() },
                })),
            }
        }

        let mut props = json!({
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": self.assumed_by },
                }],
            },
        });
        if let Some(name) = &self.role_name {
            props["RoleName"] = json!(name);
        }
        if !managed.is_empty() {
            props["ManagedPolicyArns"] = Value::Array(managed);
        }
        if !statements.is_empty() {
            props["Policies"] = json!([{
                "PolicyName": "DefaultPolicy",
                "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements },
            }]);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceGraph;

    #[test]
    fn managed_policy_is_not_an_edge() {
        let role = ExecutionIdentity::new("ecs-tasks.amazonaws.com")
            .managed_policy("service-role/AmazonECSTaskExecutionRolePolicy");
        assert_eq!(role.grants().len(), 1);
        assert!(role.references().is_empty());
        assert_eq!(
            role.properties()["ManagedPolicyArns"][0],
            "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"
        );
    }

    #[test]
    fn secret_read_becomes_grant_reference() {
        let mut graph = ResourceGraph::new();
        let secret = graph
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");
        let mut role = ExecutionIdentity::new("ecs-tasks.amazonaws.com");
        role.grant(Grant::secret_read(&secret));
        role.grant(Grant::secret_read(&secret));

        assert_eq!(role.grants().len(), 1);
        assert!(role.can_read_secret(secret.id()));
        assert_eq!(
            role.references(),
            vec![Reference::with_edge(secret.id().clone(), EdgeKind::Grant)]
        );
        let statement = &role.properties()["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Resource"], json!({ "Ref": "Secret" }));
        assert_eq!(statement["Action"][0], "secretsmanager:GetSecretValue");
    }

    #[test]
    fn trust_policy_names_principal() {
        let props = ExecutionIdentity::new("ecs-tasks.amazonaws.com")
            .role_name("SonarTaskRole")
            .properties();
        assert_eq!(props["RoleName"], "SonarTaskRole");
        assert_eq!(
            props["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "ecs-tasks.amazonaws.com"
        );
        assert!(props.get("Policies").is_none());
    }
}
