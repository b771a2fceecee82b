//! IAM identity the Coder provisioner runs under

use super::assume_role_policy;
use super::policy::{Condition, PolicyDocument, PolicyStatement};
use crate::error::Result;
use crate::model::{OwnershipTag, ProvisionerConfig};
use coderstack_cloud::{Stack, Token};
use serde_json::json;

const INSTANCE_ARN: &str = "arn:aws:ec2:*:*:instance/*";
const VOLUME_ARN: &str = "arn:aws:ec2:*:*:volume/*";

/// Workspace provisioning permissions.
///
/// Discovery is unrestricted. Anything that changes an instance or volume
/// is limited to resources carrying the ownership tag.
pub fn provisioner_policy(tag: &OwnershipTag) -> PolicyDocument {
    let owned = Condition::resource_tag(tag);

    PolicyDocument::new(vec![
        PolicyStatement::allow(
            ["ec2:DescribeSubnets", "ec2:DescribeInstanceTypeOfferings"],
            "*",
        ),
        PolicyStatement::allow(
            [
                "ec2:GetDefaultCreditSpecification",
                "ec2:DescribeIamInstanceProfileAssociations",
                "ec2:DescribeTags",
                "ec2:DescribeInstances",
                "ec2:DescribeInstanceTypes",
                "ec2:DescribeInstanceCreditSpecifications",
                "ec2:DescribeImages",
                "ec2:DescribeVolumes",
                "ec2:DescribeVolumesModifications",
                "ec2:DescribeInstanceStatus",
            ],
            "*",
        ),
        PolicyStatement::allow(
            [
                "ec2:DescribeInstanceAttribute",
                "ec2:UnmonitorInstances",
                "ec2:TerminateInstances",
                "ec2:StartInstances",
                "ec2:StopInstances",
                "ec2:DeleteTags",
                "ec2:MonitorInstances",
                "ec2:CreateTags",
                "ec2:RunInstances",
                "ec2:ModifyInstanceAttribute",
                "ec2:ModifyInstanceCreditSpecification",
            ],
            INSTANCE_ARN,
        )
        .with_condition(owned.clone()),
        PolicyStatement::allow(["ec2:ModifyVolume"], VOLUME_ARN).with_condition(owned),
    ])
}

/// IAM role plus its inline policy
#[derive(Debug, Clone)]
pub struct ProvisionerRole {
    logical_id: String,
    document: PolicyDocument,
}

impl ProvisionerRole {
    /// Fails with `PolicyViolation` before declaring anything if a mutating
    /// action escapes the ownership tag
    pub fn new(stack: &mut Stack, id: &str, config: &ProvisionerConfig) -> Result<Self> {
        let document = provisioner_policy(&config.ownership_tag);
        document.check_ownership(&config.ownership_tag)?;

        stack.add_resource(
            id,
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy(&config.principal),
                "Description": "Coder workspace provisioner",
            }),
        )?;

        let policy_id = format!("{}Policy", id);
        stack.add_resource(
            &policy_id,
            "AWS::IAM::Policy",
            json!({
                "PolicyName": policy_id,
                "PolicyDocument": document.to_json(),
                "Roles": [Token::reference(id)],
            }),
        )?;

        tracing::info!(
            role = %id,
            principal = %config.principal,
            statements = document.statements().len(),
            "Declared provisioner role"
        );

        Ok(Self {
            logical_id: id.to_string(),
            document,
        })
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn arn(&self) -> Token {
        Token::attribute(&self.logical_id, "Arn")
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::policy::{AccessLevel, access_level};
    use coderstack_cloud::StackEnv;

    #[test]
    fn test_every_mutating_action_is_tag_conditioned() {
        let tag = OwnershipTag::default();
        let document = provisioner_policy(&tag);
        let condition = Condition::resource_tag(&tag);

        let mut mutating = 0;
        for statement in document.statements() {
            for action in &statement.actions {
                if access_level(action) == AccessLevel::Mutating {
                    mutating += 1;
                    assert!(statement.has_condition(&condition), "{} is unconditioned", action);
                }
            }
        }
        assert!(mutating > 0);
        document.check_ownership(&tag).unwrap();
    }

    #[test]
    fn test_statement_layout() {
        let document = provisioner_policy(&OwnershipTag::default());
        let statements = document.statements();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0].resources, vec!["*"]);
        assert!(statements[0].conditions.is_empty());
        assert!(statements[1].conditions.is_empty());
        assert_eq!(statements[2].resources, vec![INSTANCE_ARN]);
        assert!(statements[2].actions.contains(&"ec2:RunInstances".to_string()));
        assert_eq!(statements[3].actions, vec!["ec2:ModifyVolume"]);
        assert_eq!(statements[3].resources, vec![VOLUME_ARN]);
    }

    #[test]
    fn test_role_resources() {
        let mut stack = Stack::new("Test", StackEnv::default()).unwrap();
        let role = ProvisionerRole::new(&mut stack, "ProvisionerRole", &ProvisionerConfig::default())
            .unwrap();
        let template = stack.synth().unwrap();

        let trust = &template.resources["ProvisionerRole"]["Properties"]["AssumeRolePolicyDocument"];
        assert_eq!(
            trust["Statement"][0]["Principal"]["Service"],
            "ecs-tasks.amazonaws.com"
        );

        let policy = &template.resources["ProvisionerRolePolicy"]["Properties"];
        assert_eq!(policy["Roles"], json!([{ "Ref": "ProvisionerRole" }]));
        assert_eq!(policy["PolicyDocument"]["Statement"].as_array().unwrap().len(), 4);
        assert_eq!(
            role.arn(),
            Token::attribute("ProvisionerRole", "Arn")
        );
    }
}
