//! VPC, subnets and routing

use super::name_tag;
use crate::error::{Result, StackError};
use crate::model::{NetworkConfig, SubnetType};
use coderstack_cloud::{Ipv4Cidr, Stack, Token};
use serde_json::json;
use std::collections::HashSet;

/// Size of each subnet's IPv6 block
const IPV6_SUBNET_BITS: u32 = 64;

/// `Fn::Cidr` can carve at most this many blocks
const MAX_IPV6_SUBNETS: usize = 256;

/// More zones than any region offers
const MAX_ZONES: u32 = 32;

/// Outbound path from a subnet's route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    /// `0.0.0.0/0` and `::/0` through the internet gateway
    InternetGateway,
    /// `0.0.0.0/0` through a NAT gateway (logical ID)
    NatGateway(String),
    /// `::/0` through the egress-only internet gateway
    EgressOnlyGateway,
}

/// A subnet in one availability zone
#[derive(Debug, Clone)]
pub struct Subnet {
    pub logical_id: String,
    pub tier: String,
    pub subnet_type: SubnetType,
    /// Zero-based index into `Fn::GetAZs`
    pub zone_index: usize,
    pub cidr: Ipv4Cidr,
    pub route_table_id: String,
    pub map_public_ip_on_launch: bool,
    pub egress: Vec<Egress>,
}

impl Subnet {
    pub fn id(&self) -> Token {
        Token::reference(&self.logical_id)
    }

    pub fn has_egress(&self) -> bool {
        !self.egress.is_empty()
    }
}

/// A declared VPC
#[derive(Debug, Clone)]
pub struct Network {
    logical_id: String,
    cidr: Ipv4Cidr,
    dual_stack: bool,
    subnets: Vec<Subnet>,
    internet_routes: Vec<String>,
}

impl Network {
    pub fn new(stack: &mut Stack, id: &str, config: &NetworkConfig) -> Result<Self> {
        let cidr: Ipv4Cidr = config.cidr.parse()?;
        validate(config)?;

        let zones = config.zones as usize;
        let has_public = config
            .tiers
            .iter()
            .any(|t| t.subnet_type == SubnetType::Public);
        let has_private = config
            .tiers
            .iter()
            .any(|t| t.subnet_type == SubnetType::PrivateWithEgress);
        let subnet_count = config.tiers.len() * zones;
        let path = format!("{}/{}", stack.name(), id);

        stack.add_resource(
            id,
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": name_tag(&path),
            }),
        )?;

        let ipv6_block_id = format!("{}Ipv6Cidr", id);
        if config.dual_stack {
            stack.add_resource(
                &ipv6_block_id,
                "AWS::EC2::VPCCidrBlock",
                json!({
                    "VpcId": Token::reference(id),
                    "AmazonProvidedIpv6CidrBlock": true,
                }),
            )?;
        }

        let igw_id = format!("{}Igw", id);
        let igw_attachment_id = format!("{}IgwAttachment", id);
        if has_public {
            stack.add_resource(
                &igw_id,
                "AWS::EC2::InternetGateway",
                json!({ "Tags": name_tag(&path) }),
            )?;
            stack.add_resource(
                &igw_attachment_id,
                "AWS::EC2::VPCGatewayAttachment",
                json!({
                    "VpcId": Token::reference(id),
                    "InternetGatewayId": Token::reference(&igw_id),
                }),
            )?;
        }

        let eigw_id = format!("{}EgressOnlyIgw", id);
        if config.dual_stack && has_private {
            stack.add_resource(
                &eigw_id,
                "AWS::EC2::EgressOnlyInternetGateway",
                json!({ "VpcId": Token::reference(id) }),
            )?;
        }

        let ipv6_blocks = Token::cidr(
            Token::select(0, Token::attribute(id, "Ipv6CidrBlocks")),
            subnet_count as u32,
            IPV6_SUBNET_BITS,
        );

        let mut allocator = cidr.allocator();
        let mut subnets = Vec::with_capacity(subnet_count);
        let mut internet_routes = Vec::new();
        let mut nat_gateways = Vec::new();

        for tier in &config.tiers {
            for zone in 0..zones {
                let subnet_cidr = allocator.allocate(tier.cidr_mask)?;
                let subnet_id = format!("{}{}Subnet{}", id, tier.name, zone + 1);
                let route_table_id = format!("{}RouteTable", subnet_id);

                let mut props = json!({
                    "VpcId": Token::reference(id),
                    "AvailabilityZone": Token::select(zone, Token::availability_zones()),
                    "CidrBlock": subnet_cidr.to_string(),
                    "MapPublicIpOnLaunch": tier.map_public_ip_on_launch,
                    "Tags": [
                        { "Key": "Name", "Value": format!("{}/{}Subnet{}", path, tier.name, zone + 1) },
                        { "Key": "coderstack:subnet-name", "Value": tier.name },
                        { "Key": "coderstack:subnet-type", "Value": tier.subnet_type.to_string() },
                    ],
                });
                if config.dual_stack {
                    props["Ipv6CidrBlock"] = json!(Token::select(subnets.len(), ipv6_blocks.clone()));
                    props["AssignIpv6AddressOnCreation"] = json!(true);
                }
                let subnet = stack.add_resource(&subnet_id, "AWS::EC2::Subnet", props)?;
                if config.dual_stack {
                    subnet.add_dependency(&ipv6_block_id);
                }

                stack.add_resource(
                    &route_table_id,
                    "AWS::EC2::RouteTable",
                    json!({
                        "VpcId": Token::reference(id),
                        "Tags": name_tag(format!("{}/{}Subnet{}", path, tier.name, zone + 1)),
                    }),
                )?;
                stack.add_resource(
                    format!("{}RouteTableAssociation", subnet_id),
                    "AWS::EC2::SubnetRouteTableAssociation",
                    json!({
                        "SubnetId": Token::reference(&subnet_id),
                        "RouteTableId": Token::reference(&route_table_id),
                    }),
                )?;

                let mut egress = Vec::new();
                match tier.subnet_type {
                    SubnetType::Public => {
                        let route_id = format!("{}DefaultRoute", subnet_id);
                        stack
                            .add_resource(
                                &route_id,
                                "AWS::EC2::Route",
                                json!({
                                    "RouteTableId": Token::reference(&route_table_id),
                                    "DestinationCidrBlock": "0.0.0.0/0",
                                    "GatewayId": Token::reference(&igw_id),
                                }),
                            )?
                            .add_dependency(&igw_attachment_id);
                        internet_routes.push(route_id);

                        if config.dual_stack {
                            let route_id = format!("{}DefaultRoute6", subnet_id);
                            stack
                                .add_resource(
                                    &route_id,
                                    "AWS::EC2::Route",
                                    json!({
                                        "RouteTableId": Token::reference(&route_table_id),
                                        "DestinationIpv6CidrBlock": "::/0",
                                        "GatewayId": Token::reference(&igw_id),
                                    }),
                                )?
                                .add_dependency(&igw_attachment_id);
                            internet_routes.push(route_id);
                        }
                        egress.push(Egress::InternetGateway);

                        // NAT gateways go in the first public tier's subnets
                        if nat_gateways.len() < config.nat_gateways as usize {
                            let eip_id = format!("{}Eip", subnet_id);
                            let nat_id = format!("{}NatGateway", subnet_id);
                            stack.add_resource(
                                &eip_id,
                                "AWS::EC2::EIP",
                                json!({ "Domain": "vpc", "Tags": name_tag(&path) }),
                            )?;
                            stack
                                .add_resource(
                                    &nat_id,
                                    "AWS::EC2::NatGateway",
                                    json!({
                                        "SubnetId": Token::reference(&subnet_id),
                                        "AllocationId": Token::attribute(&eip_id, "AllocationId"),
                                        "Tags": name_tag(&path),
                                    }),
                                )?
                                .add_dependency(format!("{}DefaultRoute", subnet_id));
                            nat_gateways.push(nat_id);
                        }
                    }
                    SubnetType::PrivateWithEgress => {
                        if !nat_gateways.is_empty() {
                            let nat_id = nat_gateways[zone % nat_gateways.len()].clone();
                            stack.add_resource(
                                format!("{}DefaultRoute", subnet_id),
                                "AWS::EC2::Route",
                                json!({
                                    "RouteTableId": Token::reference(&route_table_id),
                                    "DestinationCidrBlock": "0.0.0.0/0",
                                    "NatGatewayId": Token::reference(&nat_id),
                                }),
                            )?;
                            egress.push(Egress::NatGateway(nat_id));
                        }
                        if config.dual_stack {
                            stack.add_resource(
                                format!("{}DefaultRoute6", subnet_id),
                                "AWS::EC2::Route",
                                json!({
                                    "RouteTableId": Token::reference(&route_table_id),
                                    "DestinationIpv6CidrBlock": "::/0",
                                    "EgressOnlyInternetGatewayId": Token::reference(&eigw_id),
                                }),
                            )?;
                            egress.push(Egress::EgressOnlyGateway);
                        }
                    }
                }

                subnets.push(Subnet {
                    logical_id: subnet_id,
                    tier: tier.name.clone(),
                    subnet_type: tier.subnet_type,
                    zone_index: zone,
                    cidr: subnet_cidr,
                    route_table_id,
                    map_public_ip_on_launch: tier.map_public_ip_on_launch,
                    egress,
                });
            }
        }

        // Private tiers declared before the public one never saw a NAT gateway
        if let Some(subnet) = subnets.iter().find(|s| !s.has_egress()) {
            return Err(StackError::InvalidNetwork(format!(
                "subnet {} has no egress path; list the public tier first or enable dual-stack",
                subnet.logical_id
            )));
        }

        tracing::info!(
            vpc = %id,
            cidr = %cidr,
            subnets = subnets.len(),
            dual_stack = config.dual_stack,
            "Declared network"
        );

        Ok(Self {
            logical_id: id.to_string(),
            cidr,
            dual_stack: config.dual_stack,
            subnets,
            internet_routes,
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn vpc_id(&self) -> Token {
        Token::reference(&self.logical_id)
    }

    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    pub fn dual_stack(&self) -> bool {
        self.dual_stack
    }

    /// All subnets in declaration order
    pub fn all_subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn subnets(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .collect()
    }

    pub fn subnet_ids(&self, subnet_type: SubnetType) -> Vec<Token> {
        self.subnets(subnet_type).iter().map(|s| s.id()).collect()
    }

    /// Routes internet-facing resources must wait for
    pub fn internet_routes(&self) -> &[String] {
        &self.internet_routes
    }
}

fn validate(config: &NetworkConfig) -> Result<()> {
    if config.zones == 0 || config.zones > MAX_ZONES {
        return Err(StackError::InvalidNetwork(format!(
            "zone count must be between 1 and {}, got {}",
            MAX_ZONES, config.zones
        )));
    }
    if config.tiers.is_empty() {
        return Err(StackError::InvalidNetwork(
            "at least one subnet tier is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for tier in &config.tiers {
        if tier.name.is_empty() || !tier.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StackError::InvalidNetwork(format!(
                "subnet tier name must be alphanumeric: '{}'",
                tier.name
            )));
        }
        if !names.insert(tier.name.as_str()) {
            return Err(StackError::InvalidNetwork(format!(
                "duplicate subnet tier: {}",
                tier.name
            )));
        }
        if tier.subnet_type == SubnetType::PrivateWithEgress && tier.map_public_ip_on_launch {
            return Err(StackError::InvalidNetwork(format!(
                "private tier {} cannot assign public addresses",
                tier.name
            )));
        }
    }

    let has_public = config
        .tiers
        .iter()
        .any(|t| t.subnet_type == SubnetType::Public);
    let has_private = config
        .tiers
        .iter()
        .any(|t| t.subnet_type == SubnetType::PrivateWithEgress);

    if config.nat_gateways > 0 && !has_public {
        return Err(StackError::InvalidNetwork(
            "NAT gateways need a public tier".to_string(),
        ));
    }
    if config.nat_gateways > config.zones {
        return Err(StackError::InvalidNetwork(format!(
            "{} NAT gateways requested but only {} zones",
            config.nat_gateways, config.zones
        )));
    }
    if has_private && config.nat_gateways == 0 && !config.dual_stack {
        return Err(StackError::InvalidNetwork(
            "private subnets need egress: enable dual-stack or add a NAT gateway".to_string(),
        ));
    }
    if config.dual_stack && config.tiers.len() * config.zones as usize > MAX_IPV6_SUBNETS {
        return Err(StackError::InvalidNetwork(format!(
            "at most {} dual-stack subnets are supported",
            MAX_IPV6_SUBNETS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubnetTier;
    use coderstack_cloud::StackEnv;

    fn stack() -> Stack {
        Stack::new("Test", StackEnv::default()).unwrap()
    }

    #[test]
    fn test_default_network_layout() {
        let mut stack = stack();
        let network = Network::new(&mut stack, "Vpc", &NetworkConfig::default()).unwrap();

        let public = network.subnets(SubnetType::Public);
        let private = network.subnets(SubnetType::PrivateWithEgress);
        assert_eq!(public.len(), 3);
        assert_eq!(private.len(), 3);

        let cidrs: Vec<String> = network
            .all_subnets()
            .iter()
            .map(|s| s.cidr.to_string())
            .collect();
        assert_eq!(
            cidrs,
            vec![
                "10.0.0.0/24",
                "10.0.1.0/24",
                "10.0.2.0/24",
                "10.0.3.0/24",
                "10.0.4.0/24",
                "10.0.5.0/24",
            ]
        );

        assert!(public.iter().all(|s| s.map_public_ip_on_launch));
        assert!(public.iter().all(|s| s.egress == vec![Egress::InternetGateway]));
        assert!(private.iter().all(|s| !s.map_public_ip_on_launch));
        assert!(private.iter().all(|s| s.egress == vec![Egress::EgressOnlyGateway]));
    }

    #[test]
    fn test_dual_stack_resources() {
        let mut stack = stack();
        Network::new(&mut stack, "Vpc", &NetworkConfig::default()).unwrap();
        let template = stack.synth().unwrap();

        assert_eq!(template.resources_of_type("AWS::EC2::VPCCidrBlock").count(), 1);
        assert_eq!(
            template
                .resources_of_type("AWS::EC2::EgressOnlyInternetGateway")
                .count(),
            1
        );

        let subnet = &template.resources["VpcPublicSubnet2"];
        assert_eq!(subnet["DependsOn"], json!(["VpcIpv6Cidr"]));
        let ipv6 = &subnet["Properties"]["Ipv6CidrBlock"];
        assert_eq!(ipv6["Fn::Select"][0], json!(1));
        assert_eq!(ipv6["Fn::Select"][1]["Fn::Cidr"][1], json!(6));
        assert_eq!(ipv6["Fn::Select"][1]["Fn::Cidr"][2], json!("64"));
    }

    #[test]
    fn test_nat_gateways() {
        let mut stack = stack();
        let config = NetworkConfig {
            dual_stack: false,
            nat_gateways: 2,
            ..Default::default()
        };
        let network = Network::new(&mut stack, "Vpc", &config).unwrap();

        let private = network.subnets(SubnetType::PrivateWithEgress);
        assert_eq!(
            private[0].egress,
            vec![Egress::NatGateway("VpcPublicSubnet1NatGateway".to_string())]
        );
        assert_eq!(
            private[1].egress,
            vec![Egress::NatGateway("VpcPublicSubnet2NatGateway".to_string())]
        );
        assert_eq!(
            private[2].egress,
            vec![Egress::NatGateway("VpcPublicSubnet1NatGateway".to_string())]
        );

        let template = stack.synth().unwrap();
        assert_eq!(template.resources_of_type("AWS::EC2::NatGateway").count(), 2);
        assert_eq!(template.resources_of_type("AWS::EC2::VPCCidrBlock").count(), 0);
    }

    #[test]
    fn test_private_without_egress_is_rejected() {
        let mut stack = stack();
        let config = NetworkConfig {
            dual_stack: false,
            nat_gateways: 0,
            ..Default::default()
        };
        assert!(matches!(
            Network::new(&mut stack, "Vpc", &config),
            Err(StackError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_private_tier_before_public_with_nat() {
        let mut stack = stack();
        let config = NetworkConfig {
            dual_stack: false,
            nat_gateways: 1,
            tiers: vec![SubnetTier::private("App", 24), SubnetTier::public("Edge", 24)],
            ..Default::default()
        };
        assert!(matches!(
            Network::new(&mut stack, "Vpc", &config),
            Err(StackError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_invalid_address_space() {
        let mut stack = stack();
        let bad_cidr = NetworkConfig {
            cidr: "10.0.0.1/16".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Network::new(&mut stack, "Vpc", &bad_cidr),
            Err(StackError::Cloud(_))
        ));

        let mut stack = self::stack();
        let too_small = NetworkConfig {
            cidr: "10.0.0.0/22".to_string(),
            ..Default::default()
        };
        assert!(Network::new(&mut stack, "Vpc", &too_small).is_err());

        let mut stack = self::stack();
        let too_many_zones = NetworkConfig {
            zones: u32::MAX,
            dual_stack: false,
            nat_gateways: 1,
            ..Default::default()
        };
        assert!(matches!(
            Network::new(&mut stack, "Vpc", &too_many_zones),
            Err(StackError::InvalidNetwork(_))
        ));

        let mut stack = self::stack();
        let no_zones = NetworkConfig {
            zones: 0,
            ..Default::default()
        };
        assert!(Network::new(&mut stack, "Vpc", &no_zones).is_err());
    }
}
