//! Provisioner identity configuration

use serde::{Deserialize, Serialize};

/// Resource tag that marks resources the provisioner owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTag {
    pub key: String,
    pub value: String,
}

impl OwnershipTag {
    /// IAM condition key (`aws:ResourceTag/<key>`)
    pub fn condition_key(&self) -> String {
        format!("aws:ResourceTag/{}", self.key)
    }
}

impl Default for OwnershipTag {
    fn default() -> Self {
        Self {
            key: "Coder_Provisioned".to_string(),
            value: "true".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Service principal allowed to assume the role
    pub principal: String,

    pub ownership_tag: OwnershipTag,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            principal: "ecs-tasks.amazonaws.com".to_string(),
            ownership_tag: OwnershipTag::default(),
        }
    }
}
