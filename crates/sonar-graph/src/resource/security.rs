//! Network security policy.

use serde_json::{Value, json};
use sonar_common::types::{LogicalId, Protocol, ResourceKind};

use super::{Network, Reference, Resource};
use crate::graph::Handle;

/// An ingress rule admitting traffic on one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// Source range in CIDR notation.
    pub source: String,
    /// Allowed port.
    pub port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Rule description.
    pub description: String,
}

impl IngressRule {
    /// Admits TCP traffic on `port` from any IPv4 address.
    #[must_use]
    pub fn tcp_from_anywhere(port: u16, description: impl Into<String>) -> Self {
        Self {
            source: "0.0.0.0/0".into(),
            port,
            protocol: Protocol::Tcp,
            description: description.into(),
        }
    }
}

/// A security group attached to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    vpc: LogicalId,
    description: String,
    allow_all_outbound: bool,
    ingress: Vec<IngressRule>,
}

impl SecurityPolicy {
    /// Creates a policy in `vpc` with no ingress rules.
    #[must_use]
    pub fn new(vpc: &Handle<Network>, description: impl Into<String>) -> Self {
        Self {
            vpc: vpc.id().clone(),
            description: description.into(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }

    /// Sets whether all outbound traffic is allowed.
    #[must_use]
    pub const fn allow_all_outbound(mut self, allow: bool) -> Self {
        self.allow_all_outbound = allow;
        self
    }

    /// Adds an ingress rule.
    #[must_use]
    pub fn ingress(mut self, rule: IngressRule) -> Self {
        self.ingress.push(rule);
        self
    }

    /// Returns `true` if some ingress rule admits `protocol` traffic on `port`.
    #[must_use]
    pub fn allows_port(&self, protocol: Protocol, port: u16) -> bool {
        self.ingress
            .iter()
            .any(|r| r.protocol == protocol && r.port == port)
    }

    /// Network the policy belongs to.
    #[must_use]
    pub const fn vpc(&self) -> &LogicalId {
        &self.vpc
    }
}

impl Resource for SecurityPolicy {
    const KIND: ResourceKind = ResourceKind::SecurityPolicy;

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to(self.vpc.clone())]
    }

    fn properties(&self) -> Value {
        let ingress: Vec<Value> = self
            .ingress
            .iter()
            .map(|r| {
                json!({
                    "CidrIp": r.source,
                    "IpProtocol": r.protocol.to_string(),
                    "FromPort": r.port,
                    "ToPort": r.port,
                    "Description": r.description,
                })
            })
            .collect();
        let mut props = json!({
            "GroupDescription": self.description,
            "VpcId": { "Ref": self.vpc.as_str() },
            "SecurityGroupIngress": ingress,
        });
        if self.allow_all_outbound {
            props["SecurityGroupEgress"] = json!([{
                "CidrIp": "0.0.0.0/0",
                "IpProtocol": "-1",
                "Description": "Allow all outbound traffic by default",
            }]);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceGraph;

    fn vpc() -> Handle<Network> {
        let mut graph = ResourceGraph::new();
        graph
            .declare("VPC", Network::new("10.0.0.0/16"))
            .expect("declare")
    }

    #[test]
    fn allows_declared_port_only() {
        let policy = SecurityPolicy::new(&vpc(), "db")
            .ingress(IngressRule::tcp_from_anywhere(5432, "Aurora"));
        assert!(policy.allows_port(Protocol::Tcp, 5432));
        assert!(!policy.allows_port(Protocol::Tcp, 3306));
    }

    #[test]
    fn udp_rule_does_not_admit_tcp() {
        let policy = SecurityPolicy::new(&vpc(), "db").ingress(IngressRule {
            protocol: Protocol::Udp,
            ..IngressRule::tcp_from_anywhere(5432, "Aurora")
        });
        assert!(policy.allows_port(Protocol::Udp, 5432));
        assert!(!policy.allows_port(Protocol::Tcp, 5432));
    }

    #[test]
    fn renders_ingress_and_default_egress() {
        let props = SecurityPolicy::new(&vpc(), "Aurora Security Group")
            .ingress(IngressRule::tcp_from_anywhere(5432, "Aurora"))
            .properties();
        assert_eq!(props["VpcId"], json!({ "Ref": "VPC" }));
        assert_eq!(props["SecurityGroupIngress"][0]["FromPort"], 5432);
        assert_eq!(props["SecurityGroupIngress"][0]["IpProtocol"], "tcp");
        assert_eq!(props["SecurityGroupEgress"][0]["IpProtocol"], "-1");
    }

    #[test]
    fn egress_omitted_when_outbound_restricted() {
        let props = SecurityPolicy::new(&vpc(), "db")
            .allow_all_outbound(false)
            .properties();
        assert!(props.get("SecurityGroupEgress").is_none());
    }
}
