//! Stack declaration and template synthesis

use crate::env::StackEnv;
use crate::error::{CloudError, Result};
use crate::token::{Token, is_pseudo_parameter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeSet, HashSet};

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// What happens to a resource when it is removed from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }
}

/// A declared resource
#[derive(Debug, Clone)]
pub struct Resource {
    logical_id: String,
    resource_type: String,
    properties: Value,
    depends_on: Vec<String>,
    deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// Applies to both deletion and update replacement
    pub fn set_deletion_policy(&mut self, policy: DeletionPolicy) -> &mut Self {
        self.deletion_policy = Some(policy);
        self
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Add an explicit ordering dependency
    pub fn add_dependency(&mut self, logical_id: impl Into<String>) -> &mut Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    /// Every logical ID this resource refers to
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_references(&self.properties, &mut out);
        out.extend(self.depends_on.iter().cloned());
        out
    }
}

/// A stack output
#[derive(Debug, Clone)]
pub struct Output {
    pub name: String,
    pub value: Token,
    pub description: Option<String>,
}

/// A set of resources rendered into a single template
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: StackEnv,
    description: Option<String>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    metadata: Map<String, Value>,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: StackEnv) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= 128
            && name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(CloudError::InvalidConfig(format!(
                "invalid stack name '{}': use letters, digits and hyphens, starting with a letter",
                name
            )));
        }

        Ok(Self {
            name,
            env,
            description: None,
            resources: Vec::new(),
            outputs: Vec::new(),
            metadata: Map::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &StackEnv {
        &self.env
    }

    /// Declare a resource. Logical IDs must be alphanumeric and unique.
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        properties: Value,
    ) -> Result<&mut Resource> {
        let logical_id = logical_id.into();
        let resource_type = resource_type.into();

        if logical_id.is_empty()
            || logical_id.len() > 255
            || !logical_id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CloudError::InvalidConfig(format!(
                "logical ID must be alphanumeric: '{}'",
                logical_id
            )));
        }
        if self.resource(&logical_id).is_some() {
            return Err(CloudError::DuplicateResource(logical_id));
        }

        tracing::debug!(logical_id = %logical_id, resource_type = %resource_type, "Declared resource");
        self.resources.push(Resource {
            logical_id,
            resource_type,
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
        });
        let index = self.resources.len() - 1;
        Ok(&mut self.resources[index])
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.logical_id == logical_id)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Token,
        description: Option<String>,
    ) -> Result<()> {
        let name = name.into();
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(CloudError::DuplicateResource(format!("Outputs.{}", name)));
        }
        self.outputs.push(Output {
            name,
            value,
            description,
        });
        Ok(())
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Render the template.
    ///
    /// Fails if any resource or output refers to a logical ID that was never
    /// declared.
    pub fn synth(&self) -> Result<Template> {
        let declared: HashSet<&str> = self.resources.iter().map(|r| r.logical_id()).collect();

        let mut resources = Map::new();
        for resource in &self.resources {
            for target in resource.references() {
                if !declared.contains(target.as_str()) {
                    return Err(CloudError::UnresolvedReference {
                        from: resource.logical_id.clone(),
                        target,
                    });
                }
            }

            let mut body = Map::new();
            body.insert("Type".to_string(), json!(resource.resource_type));
            if !resource.depends_on.is_empty() {
                body.insert("DependsOn".to_string(), json!(resource.depends_on));
            }
            if !resource.properties.is_null() {
                body.insert("Properties".to_string(), resource.properties.clone());
            }
            if let Some(policy) = resource.deletion_policy {
                body.insert("DeletionPolicy".to_string(), json!(policy.as_str()));
                body.insert("UpdateReplacePolicy".to_string(), json!(policy.as_str()));
            }
            resources.insert(resource.logical_id.clone(), Value::Object(body));
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            if let Some(target) = output
                .value
                .references()
                .into_iter()
                .find(|id| !declared.contains(id))
            {
                return Err(CloudError::UnresolvedReference {
                    from: format!("Outputs.{}", output.name),
                    target: target.to_string(),
                });
            }

            let mut body = Map::new();
            if let Some(description) = &output.description {
                body.insert("Description".to_string(), json!(description));
            }
            body.insert("Value".to_string(), serde_json::to_value(&output.value)?);
            outputs.insert(output.name.clone(), Value::Object(body));
        }

        tracing::info!(
            stack = %self.name,
            resources = resources.len(),
            outputs = outputs.len(),
            "Synthesized template"
        );

        Ok(Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            resources,
            outputs,
        })
    }
}

/// A rendered CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Resources keyed by logical ID, in declaration order
    pub resources: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl Template {
    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// `(logical_id, body)` pairs of the given resource type
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, body)| body["Type"] == resource_type)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Collect the logical IDs named by `Ref` and `Fn::GetAtt` inside a JSON value
pub fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    if !is_pseudo_parameter(id) {
                        out.insert(id.clone());
                    }
                    return;
                }
                if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(id)) = args.first() {
                        out.insert(id.clone());
                    }
                    return;
                }
            }
            map.values().for_each(|v| collect_references(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, out)),
        _ => {}
    }
}
