//! Cloud declaration error types

use thiserror::Error;

/// Errors raised while declaring or synthesizing a stack
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid CIDR block '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Resource already declared: {0}")]
    DuplicateResource(String),

    #[error("Unresolved reference: {from} refers to '{target}' which has not been constructed")]
    UnresolvedReference { from: String, target: String },

    #[error("Value already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Value cannot be resolved before deployment: {0}")]
    Unresolvable(String),

    #[error("Assembly error: {0}")]
    AssemblyError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
