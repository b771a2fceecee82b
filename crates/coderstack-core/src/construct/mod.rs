//! Resource constructs
//!
//! Each construct declares a group of related resources on a [`Stack`] and
//! hands back typed handles (tokens, logical IDs) that downstream constructs
//! consume. Construction order is the dependency order.
//!
//! [`Stack`]: coderstack_cloud::Stack

mod cdn;
mod database;
mod network;
mod policy;
mod provisioner_role;
mod security_group;
mod service;

pub use cdn::{AllowedMethods, CacheBehavior, CachePolicy, Cdn, ViewerProtocolPolicy};
pub use database::{Database, Endpoint};
pub use network::{Egress, Network, Subnet};
pub use policy::{AccessLevel, Condition, Effect, PolicyDocument, PolicyStatement, access_level};
pub use provisioner_role::{ProvisionerRole, provisioner_policy};
pub use security_group::SecurityGroup;
pub use service::{
    ENV_ACCESS_URL, ENV_DERP_CONFIG_URL, ENV_DISABLE_PASSWORD_AUTH, ENV_HTTP_ADDRESS,
    ENV_PG_CONNECTION_URL, ENV_PROVISIONER_DAEMONS, ENV_PROXY_TRUSTED_HEADERS, FargateService,
    FargateServiceProps, LoadBalancer, MANAGED_ENVIRONMENT, ecs_cluster,
};

use serde_json::{Value, json};

/// `Tags` property with a single `Name` tag
pub(crate) fn name_tag(value: impl Into<String>) -> Value {
    json!([{ "Key": "Name", "Value": value.into() }])
}

/// Trust policy letting an AWS service assume a role
pub(crate) fn assume_role_policy(principal: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": principal },
        }],
    })
}
