//! database node

use super::{arg_bool, arg_int, arg_str, children, unknown_node};
use crate::error::Result;
use crate::model::DatabaseConfig;
use kdl::KdlNode;

pub fn parse_database(node: &KdlNode, database: &mut DatabaseConfig) -> Result<()> {
    for child in children(node) {
        match child.name().value() {
            "engine-version" => database.engine_version = arg_str(child)?,
            "instance-class" => database.instance_class = arg_str(child)?,
            "name" => database.database_name = arg_str(child)?,
            "username" => database.credentials.username = arg_str(child)?,
            "password" => database.credentials.password = arg_str(child)?,
            "port" => database.port = arg_int(child)?,
            "storage-encrypted" => database.storage_encrypted = arg_bool(child)?,
            "logical-replication" => database.logical_replication = arg_bool(child)?,
            "force-ssl" => database.force_ssl = arg_bool(child)?,
            other => unknown_node("database", other),
        }
    }
    Ok(())
}
