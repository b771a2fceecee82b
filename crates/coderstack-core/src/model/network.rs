//! Network topology configuration

use serde::{Deserialize, Serialize};

/// Kind of subnet tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routed through the internet gateway
    Public,
    /// No inbound route, outbound through NAT and/or the egress-only gateway
    PrivateWithEgress,
}

impl std::fmt::Display for SubnetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubnetType::Public => write!(f, "public"),
            SubnetType::PrivateWithEgress => write!(f, "private"),
        }
    }
}

/// One subnet per zone is created for every tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetTier {
    /// Tier name ("Public", "Private"), used in logical IDs
    pub name: String,

    pub subnet_type: SubnetType,

    /// Prefix length of each subnet (e.g. 24)
    pub cidr_mask: u8,

    /// Assign public IPv4 addresses on launch
    pub map_public_ip_on_launch: bool,
}

impl SubnetTier {
    pub fn public(name: impl Into<String>, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type: SubnetType::Public,
            cidr_mask,
            map_public_ip_on_launch: true,
        }
    }

    pub fn private(name: impl Into<String>, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            subnet_type: SubnetType::PrivateWithEgress,
            cidr_mask,
            map_public_ip_on_launch: false,
        }
    }
}

/// VPC configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// IPv4 address block
    pub cidr: String,

    /// Number of availability zones to spread subnets over
    pub zones: u32,

    /// Add an Amazon-provided IPv6 block and address every subnet with both families
    pub dual_stack: bool,

    /// NAT gateways for private IPv4 egress (0 = IPv6 egress only)
    pub nat_gateways: u32,

    pub tiers: Vec<SubnetTier>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            zones: 3,
            dual_stack: true,
            nat_gateways: 0,
            tiers: vec![SubnetTier::public("Public", 24), SubnetTier::private("Private", 24)],
        }
    }
}
