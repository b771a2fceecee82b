//! Deployment plan rendering

use crate::stack::Stack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A planned resource creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// CloudFormation resource type (e.g., "AWS::EC2::VPC")
    pub resource_type: String,

    /// Logical ID of the resource
    pub resource_id: String,

    /// Description of the action
    pub description: String,

    /// Logical IDs the resource refers to
    pub references: Vec<String>,
}

/// Plan containing every declared resource, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Stack being planned
    pub stack: String,

    /// `aws://<account>/<region>`
    pub environment: String,

    /// List of actions to perform
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn from_stack(stack: &Stack) -> Self {
        let actions = stack
            .resources()
            .map(|resource| Action {
                id: format!("create-{}", resource.logical_id()),
                resource_type: resource.resource_type().to_string(),
                resource_id: resource.logical_id().to_string(),
                description: format!(
                    "Create {} {}",
                    resource.resource_type(),
                    resource.logical_id()
                ),
                references: resource.references().into_iter().collect(),
            })
            .collect();

        Self {
            stack: stack.name().to_string(),
            environment: stack.env().uri(),
            actions,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Get actions by resource type
    pub fn actions_by_type(&self, resource_type: &str) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.resource_type == resource_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let mut by_service = BTreeMap::new();
        for action in &self.actions {
            *by_service.entry(service_of(&action.resource_type)).or_insert(0) += 1;
        }
        PlanSummary {
            total: self.actions.len(),
            by_service,
        }
    }
}

/// "AWS::EC2::VPC" -> "EC2"
fn service_of(resource_type: &str) -> String {
    resource_type
        .split("::")
        .nth(1)
        .unwrap_or(resource_type)
        .to_string()
}

/// Summary of planned actions
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub total: usize,
    pub by_service: BTreeMap<String, usize>,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let services: Vec<String> = self
            .by_service
            .iter()
            .map(|(service, count)| format!("{}: {}", service, count))
            .collect();
        write!(
            f,
            "{} to create ({})",
            self.total,
            services.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StackEnv;
    use crate::token::Token;
    use serde_json::json;

    #[test]
    fn test_plan_from_stack() {
        let mut stack = Stack::new("Coder", StackEnv::default()).unwrap();
        stack.add_resource("Vpc", "AWS::EC2::VPC", json!({})).unwrap();
        stack
            .add_resource(
                "Subnet",
                "AWS::EC2::Subnet",
                json!({"VpcId": Token::reference("Vpc")}),
            )
            .unwrap();
        stack
            .add_resource("Cluster", "AWS::ECS::Cluster", json!({}))
            .unwrap();

        let plan = Plan::from_stack(&stack);
        assert!(plan.has_changes());
        assert_eq!(plan.environment, "aws://unknown-account/ap-northeast-1");
        assert_eq!(plan.actions[1].id, "create-Subnet");
        assert_eq!(plan.actions[1].references, vec!["Vpc".to_string()]);
        assert_eq!(plan.actions_by_type("AWS::EC2::Subnet").len(), 1);

        let summary = plan.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_service["EC2"], 2);
        assert_eq!(summary.to_string(), "3 to create (EC2: 2, ECS: 1)");
    }
}
