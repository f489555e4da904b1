//! Container-orchestration capacity pool.

use serde_json::{Value, json};
use sonar_common::constants::USER_DATA_SHEBANG;
use sonar_common::types::{LogicalId, ResourceKind};

use super::{Network, Reference, Resource};
use crate::graph::Handle;

/// Ordered shell commands run on every host at boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    commands: Vec<String>,
}

impl UserData {
    /// Appends one command.
    pub fn add_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    /// Appends several commands, keeping their order.
    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    /// Commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// The boot script handed to each host.
    #[must_use]
    pub fn render(&self) -> String {
        let mut script = String::from(USER_DATA_SHEBANG);
        for command in &self.commands {
            script.push('\n');
            script.push_str(command);
        }
        script
    }
}

/// A container cluster backed by an auto-scaled pool of hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeCluster {
    vpc: LogicalId,
    instance_type: String,
    desired_capacity: u32,
    user_data: UserData,
}

impl ComputeCluster {
    /// Creates a cluster in `vpc` with one host of `instance_type`.
    #[must_use]
    pub fn new(vpc: &Handle<Network>, instance_type: impl Into<String>) -> Self {
        Self {
            vpc: vpc.id().clone(),
            instance_type: instance_type.into(),
            desired_capacity: 1,
            user_data: UserData::default(),
        }
    }

    /// Sets the number of hosts.
    #[must_use]
    pub const fn desired_capacity(mut self, capacity: u32) -> Self {
        self.desired_capacity = capacity;
        self
    }

    /// Host launch configuration boot script.
    pub const fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }

    /// Bootstrap commands in execution order.
    #[must_use]
    pub fn bootstrap_commands(&self) -> &[String] {
        self.user_data.commands()
    }
}

impl Resource for ComputeCluster {
    const KIND: ResourceKind = ResourceKind::ComputeCluster;

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to(self.vpc.clone())]
    }

    fn properties(&self) -> Value {
        json!({
            "Capacity": {
                "InstanceType": self.instance_type,
                "MinCapacity": self.desired_capacity,
                "MaxCapacity": self.desired_capacity,
                "DesiredCapacity": self.desired_capacity,
                "VpcSubnets": {
                    "VpcId": { "Ref": self.vpc.as_str() },
                    "SubnetType": "Private",
                },
                "LaunchConfiguration": {
                    "UserData": { "Fn::Base64": self.user_data.render() },
                },
            },
        })
    }
}
