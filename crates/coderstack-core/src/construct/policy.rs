//! IAM policy documents and the ownership-tag check

use crate::error::{Result, StackError};
use crate::model::OwnershipTag;
use serde_json::{Map, Value, json};

const POLICY_VERSION: &str = "2012-10-17";

/// Action name prefixes that only read state
const READ_ONLY_PREFIXES: [&str; 3] = ["Describe", "Get", "List"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// Whether an action can change state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    ReadOnly,
    Mutating,
}

/// Classify `service:Action` by its verb; wildcards count as mutating
pub fn access_level(action: &str) -> AccessLevel {
    let verb = action.split_once(':').map_or(action, |(_, verb)| verb);
    if READ_ONLY_PREFIXES.iter().any(|p| verb.starts_with(p)) && !verb.contains('*') {
        AccessLevel::ReadOnly
    } else {
        AccessLevel::Mutating
    }
}

/// A single condition entry, e.g. `StringEquals` on `aws:ResourceTag/Key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub operator: String,
    pub key: String,
    pub value: String,
}

impl Condition {
    pub fn string_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operator: "StringEquals".to_string(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Condition on the resource carrying the ownership tag
    pub fn resource_tag(tag: &OwnershipTag) -> Self {
        Self::string_equals(tag.condition_key(), &tag.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl PolicyStatement {
    pub fn allow<I, S>(actions: I, resource: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: vec![resource.into()],
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn has_condition(&self, condition: &Condition) -> bool {
        self.conditions.contains(condition)
    }

    pub fn mutating_actions(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .map(String::as_str)
            .filter(|a| access_level(a) == AccessLevel::Mutating)
    }

    /// Render as IAM JSON; single-element lists collapse to a string
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("Effect".to_string(), json!(self.effect.as_str()));
        body.insert("Action".to_string(), one_or_many(&self.actions));
        body.insert("Resource".to_string(), one_or_many(&self.resources));

        if !self.conditions.is_empty() {
            let mut operators: Map<String, Value> = Map::new();
            for condition in &self.conditions {
                let entry = operators
                    .entry(condition.operator.clone())
                    .or_insert_with(|| json!({}));
                if let Some(entry) = entry.as_object_mut() {
                    entry.insert(condition.key.clone(), json!(condition.value));
                }
            }
            body.insert("Condition".to_string(), Value::Object(operators));
        }
        Value::Object(body)
    }
}

fn one_or_many(values: &[String]) -> Value {
    match values {
        [single] => json!(single),
        many => json!(many),
    }
}

/// An ordered list of statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    /// Every allowed mutating action must be conditioned on the ownership tag
    pub fn check_ownership(&self, tag: &OwnershipTag) -> Result<()> {
        let required = Condition::resource_tag(tag);
        for (index, statement) in self.statements.iter().enumerate() {
            if statement.effect != Effect::Allow || statement.has_condition(&required) {
                continue;
            }
            if let Some(action) = statement.mutating_actions().next() {
                return Err(StackError::PolicyViolation(format!(
                    "statement {} grants {} on {} without {} = \"{}\"",
                    index + 1,
                    action,
                    statement.resources.join(", "),
                    required.key,
                    required.value
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": self
                .statements
                .iter()
                .map(PolicyStatement::to_json)
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level() {
        assert_eq!(access_level("ec2:DescribeInstances"), AccessLevel::ReadOnly);
        assert_eq!(access_level("ec2:GetDefaultCreditSpecification"), AccessLevel::ReadOnly);
        assert_eq!(access_level("ec2:RunInstances"), AccessLevel::Mutating);
        assert_eq!(access_level("ec2:CreateTags"), AccessLevel::Mutating);
        assert_eq!(access_level("ec2:*"), AccessLevel::Mutating);
        assert_eq!(access_level("ec2:Describe*"), AccessLevel::Mutating);
    }

    #[test]
    fn test_check_ownership() {
        let tag = OwnershipTag::default();
        let reads = PolicyStatement::allow(["ec2:DescribeInstances"], "*");
        let owned = PolicyStatement::allow(["ec2:TerminateInstances"], "arn:aws:ec2:*:*:instance/*")
            .with_condition(Condition::resource_tag(&tag));

        let document = PolicyDocument::new(vec![reads.clone(), owned]);
        document.check_ownership(&tag).unwrap();

        let mut leaky = document.clone();
        leaky.add_statement(PolicyStatement::allow(["ec2:RunInstances"], "*"));
        let err = leaky.check_ownership(&tag).unwrap_err();
        assert!(matches!(err, StackError::PolicyViolation(_)));
        assert!(err.to_string().contains("ec2:RunInstances"));

        let wrong_value = PolicyStatement::allow(["ec2:StopInstances"], "*")
            .with_condition(Condition::string_equals(tag.condition_key(), "false"));
        assert!(
            PolicyDocument::new(vec![reads, wrong_value])
                .check_ownership(&tag)
                .is_err()
        );
    }

    #[test]
    fn test_statement_json() {
        let tag = OwnershipTag::default();
        let statement = PolicyStatement::allow(["ec2:ModifyVolume"], "arn:aws:ec2:*:*:volume/*")
            .with_condition(Condition::resource_tag(&tag));

        assert_eq!(
            statement.to_json(),
            json!({
                "Effect": "Allow",
                "Action": "ec2:ModifyVolume",
                "Resource": "arn:aws:ec2:*:*:volume/*",
                "Condition": {
                    "StringEquals": { "aws:ResourceTag/Coder_Provisioned": "true" }
                }
            })
        );

        let many = PolicyStatement::allow(["ec2:DescribeSubnets", "ec2:DescribeImages"], "*");
        assert_eq!(
            many.to_json()["Action"],
            json!(["ec2:DescribeSubnets", "ec2:DescribeImages"])
        );
        assert!(many.to_json().get("Condition").is_none());
    }
}
