//! Isolated virtual network.

use serde_json::{Value, json};
use sonar_common::types::ResourceKind;

use super::{Reference, Resource};

/// A virtual network spanning several availability zones.
///
/// Each zone gets one public and one private subnet; private subnets reach
/// the internet through one NAT gateway per zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    cidr: String,
    max_azs: u8,
    subnet_cidr_mask: u8,
}

impl Network {
    /// Creates a network over the given address space.
    #[must_use]
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            max_azs: 3,
            subnet_cidr_mask: 24,
        }
    }

    /// Sets the number of availability zones spanned.
    #[must_use]
    pub const fn max_azs(mut self, azs: u8) -> Self {
        self.max_azs = azs;
        self
    }

    /// Sets the prefix length of every subnet.
    #[must_use]
    pub const fn subnet_cidr_mask(mut self, mask: u8) -> Self {
        self.subnet_cidr_mask = mask;
        self
    }

    /// Address space in CIDR notation.
    #[must_use]
    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    /// Number of availability zones spanned.
    #[must_use]
    pub const fn availability_zones(&self) -> u8 {
        self.max_azs
    }
}

impl Resource for Network {
    const KIND: ResourceKind = ResourceKind::Network;

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn properties(&self) -> Value {
        json!({
            "CidrBlock": self.cidr,
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "InstanceTenancy": "default",
            "MaxAzs": self.max_azs,
            "NatGateways": self.max_azs,
            "SubnetConfiguration": [
                { "Name": "Public", "SubnetType": "Public", "CidrMask": self.subnet_cidr_mask },
                { "Name": "Private", "SubnetType": "Private", "CidrMask": self.subnet_cidr_mask },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_span_three_zones() {
        let network = Network::new("10.0.0.0/16");
        assert_eq!(network.availability_zones(), 3);
        assert_eq!(network.properties()["SubnetConfiguration"][0]["CidrMask"], 24);
    }

    #[test]
    fn nat_gateway_per_zone() {
        let props = Network::new("10.0.0.0/16").max_azs(2).properties();
        assert_eq!(props["MaxAzs"], 2);
        assert_eq!(props["NatGateways"], 2);
    }
}
