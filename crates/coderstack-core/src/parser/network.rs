//! network node

use super::{arg_bool, arg_int, arg_str, children, prop_int, unknown_node};
use crate::error::{Result, StackError};
use crate::model::{NetworkConfig, SubnetTier, SubnetType};
use kdl::KdlNode;

/// Parse the `network` block
///
/// ```kdl
/// network {
///     cidr "10.0.0.0/16"
///     zones 3
///     dual-stack #true
///     nat-gateways 0
///     subnet "Public" type="public" mask=24
///     subnet "Private" type="private" mask=24
/// }
/// ```
///
/// `subnet-mask` sets the prefix of every default tier. Any `subnet` node
/// replaces the default tiers entirely.
pub fn parse_network(node: &KdlNode, network: &mut NetworkConfig) -> Result<()> {
    let mut tiers = Vec::new();

    for child in children(node) {
        match child.name().value() {
            "cidr" => network.cidr = arg_str(child)?,
            "zones" => network.zones = arg_int(child)?,
            "dual-stack" => network.dual_stack = arg_bool(child)?,
            "nat-gateways" => network.nat_gateways = arg_int(child)?,
            "subnet-mask" => {
                let mask: u8 = arg_int(child)?;
                for tier in &mut network.tiers {
                    tier.cidr_mask = mask;
                }
            }
            "subnet" => tiers.push(parse_subnet(child)?),
            other => unknown_node("network", other),
        }
    }

    if !tiers.is_empty() {
        network.tiers = tiers;
    }
    Ok(())
}

fn parse_subnet(node: &KdlNode) -> Result<SubnetTier> {
    let name = arg_str(node)?;
    let subnet_type = match node.get("type").and_then(|v| v.as_string()) {
        Some("public") => SubnetType::Public,
        Some("private") | None => SubnetType::PrivateWithEgress,
        Some(other) => {
            return Err(StackError::InvalidConfig(format!(
                "subnet '{}': unknown type '{}' (expected public or private)",
                name, other
            )));
        }
    };
    let mask = prop_int(node, "mask")?.unwrap_or(24);

    let mut tier = match subnet_type {
        SubnetType::Public => SubnetTier::public(name, mask),
        SubnetType::PrivateWithEgress => SubnetTier::private(name, mask),
    };
    if let Some(map_public_ip) = node.get("map-public-ip").and_then(|v| v.as_bool()) {
        tier.map_public_ip_on_launch = map_public_ip;
    }
    Ok(tier)
}
