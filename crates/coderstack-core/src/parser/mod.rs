//! KDL configuration parser
//!
//! Reads `coder.kdl` into a [`StackConfig`]. Every section is optional and
//! starts from the model defaults, so a file only lists what it overrides.
//! Node parsers for each section live in their own module.

mod cdn;
mod database;
mod network;
mod service;


use cdn::parse_cdn;
use database::parse_database;
use network::parse_network;
use service::parse_service;

use crate::error::{Result, StackError};
use crate::model::{OwnershipTag, ProvisionerConfig, StackConfig};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::Path;

/// Parse a configuration file
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<StackConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| StackError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "Parsing configuration");
    parse_kdl_string(&content)
}

/// Parse configuration text
pub fn parse_kdl_string(content: &str) -> Result<StackConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = StackConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => config.name = arg_str(node)?,
            "account" => config.account = Some(arg_str(node)?),
            "region" => config.region = Some(arg_str(node)?),
            "network" => parse_network(node, &mut config.network)?,
            "database" => parse_database(node, &mut config.database)?,
            "provisioner" => parse_provisioner(node, &mut config.provisioner)?,
            "service" => parse_service(node, &mut config.service)?,
            "cdn" => parse_cdn(node, &mut config.cdn)?,
            other => unknown_node("top level", other),
        }
    }

    Ok(config)
}

fn parse_provisioner(node: &KdlNode, provisioner: &mut ProvisionerConfig) -> Result<()> {
    for child in children(node) {
        match child.name().value() {
            "principal" => provisioner.principal = arg_str(child)?,
            // ownership-tag "Coder_Provisioned" "true"
            "ownership-tag" => {
                let key = arg_str(child)?;
                let value = positional(child)
                    .nth(1)
                    .and_then(|v| v.as_string())
                    .unwrap_or("true")
                    .to_string();
                provisioner.ownership_tag = OwnershipTag { key, value };
            }
            other => unknown_node("provisioner", other),
        }
    }
    Ok(())
}

/// Child nodes, or nothing for a node without a block
fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

/// Positional (unnamed) arguments of a node
fn positional(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

fn first_arg<'a>(node: &'a KdlNode) -> Result<&'a KdlValue> {
    positional(node).next().ok_or_else(|| {
        StackError::InvalidConfig(format!("'{}' requires a value", node.name().value()))
    })
}

fn arg_str(node: &KdlNode) -> Result<String> {
    first_arg(node)?
        .as_string()
        .map(|s| s.to_string())
        .ok_or_else(|| type_error(node, "a string"))
}

fn arg_bool(node: &KdlNode) -> Result<bool> {
    first_arg(node)?
        .as_bool()
        .ok_or_else(|| type_error(node, "#true or #false"))
}

fn arg_int<T: TryFrom<i128>>(node: &KdlNode) -> Result<T> {
    let value = first_arg(node)?
        .as_integer()
        .ok_or_else(|| type_error(node, "an integer"))?;
    T::try_from(value).map_err(|_| {
        StackError::InvalidConfig(format!(
            "'{}' is out of range: {}",
            node.name().value(),
            value
        ))
    })
}

/// Named property as an integer, e.g. `mask=24`
fn prop_int<T: TryFrom<i128>>(node: &KdlNode, key: &str) -> Result<Option<T>> {
    let Some(value) = node.get(key) else {
        return Ok(None);
    };
    let value = value.as_integer().ok_or_else(|| {
        StackError::InvalidConfig(format!(
            "'{}' on '{}' must be an integer",
            key,
            node.name().value()
        ))
    })?;
    T::try_from(value).map(Some).map_err(|_| {
        StackError::InvalidConfig(format!("'{}' is out of range: {}", key, value))
    })
}

fn type_error(node: &KdlNode, expected: &str) -> StackError {
    StackError::InvalidConfig(format!(
        "'{}' must be {}",
        node.name().value(),
        expected
    ))
}

fn unknown_node(section: &str, name: &str) {
    tracing::warn!(section = section, node = name, "Ignoring unknown configuration node");
}
