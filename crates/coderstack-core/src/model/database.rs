//! Managed PostgreSQL configuration

use serde::{Deserialize, Serialize};

/// Master user credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Aurora PostgreSQL cluster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Engine version pin (e.g. "16.6")
    pub engine_version: String,

    /// Writer instance class
    pub instance_class: String,

    /// Default database created with the cluster
    pub database_name: String,

    pub credentials: Credentials,

    pub port: u16,

    pub storage_encrypted: bool,

    /// `rds.logical_replication`
    pub logical_replication: bool,

    /// `rds.force_ssl`
    pub force_ssl: bool,
}

impl DatabaseConfig {
    /// Major engine version ("16.6" -> "16")
    pub fn major_version(&self) -> &str {
        self.engine_version
            .split('.')
            .next()
            .unwrap_or(&self.engine_version)
    }

    /// Cluster parameter group family ("aurora-postgresql16")
    pub fn parameter_family(&self) -> String {
        format!("aurora-postgresql{}", self.major_version())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine_version: "16.6".to_string(),
            instance_class: "db.t4g.medium".to_string(),
            database_name: "coder".to_string(),
            credentials: Credentials {
                username: "postgres".to_string(),
                password: "postgres".to_string(),
            },
            port: 5432,
            storage_encrypted: true,
            logical_replication: true,
            force_ssl: false,
        }
    }
}
