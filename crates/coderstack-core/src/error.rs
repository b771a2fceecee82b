use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Cloud(#[from] coderstack_cloud::CloudError),

    #[error(transparent)]
    Config(#[from] coderstack_config::ConfigError),

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Invalid health check: {0}")]
    InvalidHealthCheck(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Environment variable {0} is managed by the stack and cannot be overridden")]
    ReservedEnvironment(String),

    #[error("Invalid path pattern '{pattern}': {message}")]
    InvalidPathPattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, StackError>;
