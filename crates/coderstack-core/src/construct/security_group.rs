//! Security groups and the rules between them

use super::{Network, name_tag};
use crate::error::Result;
use coderstack_cloud::{Stack, Token};
use serde_json::json;

/// A VPC security group
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    logical_id: String,
}

impl SecurityGroup {
    /// Declare a group that allows all outbound traffic
    pub fn new(stack: &mut Stack, id: &str, network: &Network, description: &str) -> Result<Self> {
        let mut egress = vec![json!({
            "CidrIp": "0.0.0.0/0",
            "IpProtocol": "-1",
            "Description": "Allow all outbound traffic by default",
        })];
        if network.dual_stack() {
            egress.push(json!({
                "CidrIpv6": "::/0",
                "IpProtocol": "-1",
                "Description": "Allow all outbound IPv6 traffic by default",
            }));
        }

        let name = format!("{}/{}", stack.name(), id);
        stack.add_resource(
            id,
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": description,
                "VpcId": network.vpc_id(),
                "SecurityGroupEgress": egress,
                "Tags": name_tag(name),
            }),
        )?;

        Ok(Self {
            logical_id: id.to_string(),
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn group_id(&self) -> Token {
        Token::attribute(&self.logical_id, "GroupId")
    }

    /// Allow TCP on `port` from another group
    pub fn allow_from(
        &self,
        stack: &mut Stack,
        peer: &SecurityGroup,
        port: u16,
        description: &str,
    ) -> Result<()> {
        let rule_id = format!("{}From{}Port{}", self.logical_id, peer.logical_id, port);
        stack.add_resource(
            rule_id,
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": self.group_id(),
                "SourceSecurityGroupId": peer.group_id(),
                "IpProtocol": "tcp",
                "FromPort": port,
                "ToPort": port,
                "Description": description,
            }),
        )?;
        Ok(())
    }

    /// Allow TCP on `port` from anywhere, over both address families when `ipv6`
    pub fn allow_from_anywhere(
        &self,
        stack: &mut Stack,
        port: u16,
        ipv6: bool,
        description: &str,
    ) -> Result<()> {
        let mut sources = vec![("Ipv4", json!({ "CidrIp": "0.0.0.0/0" }))];
        if ipv6 {
            sources.push(("Ipv6", json!({ "CidrIpv6": "::/0" })));
        }

        for (family, source) in sources {
            let mut rule = json!({
                "GroupId": self.group_id(),
                "IpProtocol": "tcp",
                "FromPort": port,
                "ToPort": port,
                "Description": description,
            });
            if let (Some(rule), Some(source)) = (rule.as_object_mut(), source.as_object()) {
                rule.extend(source.clone());
            }
            stack.add_resource(
                format!("{}Anywhere{}Port{}", self.logical_id, family, port),
                "AWS::EC2::SecurityGroupIngress",
                rule,
            )?;
        }
        Ok(())
    }
}
