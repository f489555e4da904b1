//! Managed relational database cluster.

use serde_json::{Value, json};
use sonar_common::types::{DatabaseEngine, LogicalId, ResourceKind};

use super::secret::PASSWORD_FIELD;
use super::{Credential, Network, Reference, Resource, SecurityPolicy};
use crate::graph::Handle;
use crate::token::Token;

/// Attribute holding the writer endpoint host name.
pub const ENDPOINT_ADDRESS: &str = "Endpoint.Address";

/// Attribute holding the writer endpoint port.
pub const ENDPOINT_PORT: &str = "Endpoint.Port";

/// A database cluster whose master password comes from a [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCluster {
    engine: DatabaseEngine,
    engine_version: Option<String>,
    database_name: Option<String>,
    parameter_group: Option<String>,
    instance_type: String,
    instance_count: u8,
    port: u16,
    vpc: LogicalId,
    security_groups: Vec<LogicalId>,
    master_username: String,
    master_password: Token,
}

impl DatabaseCluster {
    /// Creates a cluster in `vpc` whose master login is read from `credential`.
    ///
    /// The listening port defaults to the engine's port.
    #[must_use]
    pub fn new(
        engine: DatabaseEngine,
        vpc: &Handle<Network>,
        credential: &Handle<Credential>,
        master_username: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            engine_version: None,
            database_name: None,
            parameter_group: None,
            instance_type: "db.t3.medium".into(),
            instance_count: 2,
            port: engine.default_port(),
            vpc: vpc.id().clone(),
            security_groups: Vec::new(),
            master_username: master_username.into(),
            master_password: credential.field(PASSWORD_FIELD),
        }
    }

    /// Sets the engine version.
    #[must_use]
    pub fn engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = Some(version.into());
        self
    }

    /// Sets the default schema created on the cluster.
    #[must_use]
    pub fn default_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Uses an existing parameter group, referenced by name.
    #[must_use]
    pub fn parameter_group(mut self, name: impl Into<String>) -> Self {
        self.parameter_group = Some(name.into());
        self
    }

    /// Sets the instance class of every member.
    #[must_use]
    pub fn instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    /// Sets the number of members.
    #[must_use]
    pub const fn instance_count(mut self, count: u8) -> Self {
        self.instance_count = count;
        self
    }

    /// Overrides the listening port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Attaches a security policy to every member.
    #[must_use]
    pub fn security_group(mut self, policy: &Handle<SecurityPolicy>) -> Self {
        self.security_groups.push(policy.id().clone());
        self
    }

    /// Port the cluster listens on.
    #[must_use]
    pub const fn listening_port(&self) -> u16 {
        self.port
    }

    /// Attached security policies.
    #[must_use]
    pub fn security_groups(&self) -> &[LogicalId] {
        &self.security_groups
    }

    /// Deferred master password.
    #[must_use]
    pub const fn master_password(&self) -> &Token {
        &self.master_password
    }
}

impl Resource for DatabaseCluster {
    const KIND: ResourceKind = ResourceKind::DatabaseCluster;

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::to(self.vpc.clone())];
        refs.extend(self.security_groups.iter().cloned().map(Reference::to));
        refs.extend(
            self.master_password
                .references()
                .into_iter()
                .cloned()
                .map(Reference::to),
        );
        refs
    }

    fn properties(&self) -> Value {
        let groups: Vec<Value> = self
            .security_groups
            .iter()
            .map(|id| json!({ "Ref": id.as_str() }))
            .collect();
        let mut props = json!({
            "Engine": self.engine.as_str(),
            "Port": self.port,
            "MasterUsername": self.master_username,
            "MasterUserPassword": self.master_password.render(),
            "VpcSecurityGroupIds": groups,
            "DBSubnetGroup": {
                "VpcId": { "Ref": self.vpc.as_str() },
                "SubnetType": "Private",
            },
            "Instances": {
                "Count": self.instance_count,
                "InstanceClass": self.instance_type,
            },
        });
        if let Some(version) = &self.engine_version {
            props["EngineVersion"] = json!(version);
        }
        if let Some(name) = &self.database_name {
            props["DatabaseName"] = json!(name);
        }
        if let Some(group) = &self.parameter_group {
            props["DBClusterParameterGroupName"] = json!(group);
        }
        props
    }
}

impl Handle<DatabaseCluster> {
    /// Deferred writer endpoint host name.
    #[must_use]
    pub fn endpoint_address(&self) -> Token {
        self.attribute(ENDPOINT_ADDRESS)
    }

    /// Deferred writer endpoint port.
    #[must_use]
    pub fn endpoint_port(&self) -> Token {
        self.attribute(ENDPOINT_PORT)
    }

    /// Deferred `host:port` of the writer endpoint.
    #[must_use]
    pub fn socket_address(&self) -> Token {
        Token::concat([
            self.endpoint_address(),
            Token::from(":"),
            self.endpoint_port(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceGraph;
    use crate::resource::EdgeKind;

    fn fixture() -> (ResourceGraph, Handle<Network>, Handle<Credential>) {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare("VPC", Network::new("10.0.0.0/16"))
            .expect("vpc");
        let secret = graph
            .declare("Secret", Credential::new("sonar"))
            .expect("secret");
        (graph, vpc, secret)
    }

    #[test]
    fn port_follows_engine() {
        let (_, vpc, secret) = fixture();
        let pg = DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "sonar");
        assert_eq!(pg.listening_port(), 5432);
        let mysql = DatabaseCluster::new(DatabaseEngine::AuroraMysql, &vpc, &secret, "sonar");
        assert_eq!(mysql.listening_port(), 3306);
    }

    #[test]
    fn password_is_a_secret_reference() {
        let (_, vpc, secret) = fixture();
        let cluster = DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "u");
        assert!(cluster.master_password().contains_secret());
        assert!(!cluster.master_password().is_resolved());
    }

    #[test]
    fn declaring_links_network_and_credential() {
        let (mut graph, vpc, secret) = fixture();
        let db = graph
            .declare(
                "Database",
                DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "sonar"),
            )
            .expect("db");
        assert_eq!(
            graph.dependencies(db.id()),
            vec![
                (secret.id(), EdgeKind::Reference),
                (vpc.id(), EdgeKind::Reference),
            ]
        );
    }

    #[test]
    fn optional_properties_render_when_set() {
        let (_, vpc, secret) = fixture();
        let props = DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "u")
            .engine_version("11.6")
            .default_database_name("sonarqube")
            .parameter_group("default.aurora-postgresql11")
            .properties();
        assert_eq!(props["EngineVersion"], "11.6");
        assert_eq!(props["DatabaseName"], "sonarqube");
        assert_eq!(props["DBClusterParameterGroupName"], "default.aurora-postgresql11");
        assert_eq!(props["Instances"]["InstanceClass"], "db.t3.medium");
    }

    #[test]
    fn socket_address_is_deferred() {
        let (mut graph, vpc, secret) = fixture();
        let db = graph
            .declare(
                "Database",
                DatabaseCluster::new(DatabaseEngine::AuroraPostgresql, &vpc, &secret, "sonar"),
            )
            .expect("db");
        let address = db.socket_address();
        assert!(!address.is_resolved());
        assert!(address.reads_attribute(db.id(), ENDPOINT_ADDRESS));
        assert_eq!(
            address.to_string(),
            "${Database.Endpoint.Address}:${Database.Endpoint.Port}"
        );
    }
}
