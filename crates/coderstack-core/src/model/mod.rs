//! Stack configuration model
//!
//! Every field defaults to the reference Coder deployment; a `coder.kdl`
//! file only needs to name what it changes.

mod cdn;
mod database;
mod network;
mod provisioner;
mod service;

pub use cdn::*;
pub use database::*;
pub use network::*;
pub use provisioner::*;
pub use service::*;

use serde::{Deserialize, Serialize};

/// Default stack name
pub const DEFAULT_STACK_NAME: &str = "Coder";

/// Complete stack configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub name: String,

    /// Account to render for; the CLI flag / `CDK_DEFAULT_ACCOUNT` wins
    pub account: Option<String>,

    /// Region to render for; the CLI flag / `CDK_DEFAULT_REGION` wins
    pub region: Option<String>,

    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub provisioner: ProvisionerConfig,
    pub service: ServiceConfig,
    pub cdn: CdnConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STACK_NAME.to_string(),
            account: None,
            region: None,
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            provisioner: ProvisionerConfig::default(),
            service: ServiceConfig::default(),
            cdn: CdnConfig::default(),
        }
    }
}
