//! service node

use super::{arg_bool, arg_int, arg_str, children, first_arg, unknown_node};
use crate::error::{Result, StackError};
use crate::health::HealthCheck;
use crate::model::ServiceConfig;
use kdl::KdlNode;
use std::time::Duration;

pub fn parse_service(node: &KdlNode, service: &mut ServiceConfig) -> Result<()> {
    for child in children(node) {
        match child.name().value() {
            "image" => service.image = arg_str(child)?,
            "container-name" => service.container_name = arg_str(child)?,
            "port" => service.container_port = arg_int(child)?,
            "cpu" => service.cpu = arg_int(child)?,
            "memory" => service.memory_mib = arg_int(child)?,
            "desired-count" => service.desired_count = arg_int(child)?,
            "architecture" => service.cpu_architecture = arg_str(child)?.parse()?,
            "assign-public-ip" => service.assign_public_ip = arg_bool(child)?,
            "provisioner-daemons" => service.provisioner_daemons = arg_int(child)?,
            "disable-password-auth" => service.disable_password_auth = arg_bool(child)?,
            "trusted-proxy-header" => service.trusted_proxy_header = arg_str(child)?,
            "derp-config-url" => service.derp_config_url = arg_str(child)?,
            "env" => parse_env(child, service)?,
            "health-check" => parse_health_check(child, &mut service.health_check)?,
            other => unknown_node("service", other),
        }
    }
    Ok(())
}

/// `env { NAME "value" }`; numbers and booleans are stringified
fn parse_env(node: &KdlNode, service: &mut ServiceConfig) -> Result<()> {
    for var in children(node) {
        let key = var.name().value().to_string();
        let value = first_arg(var)?;
        let value = if let Some(s) = value.as_string() {
            s.to_string()
        } else if let Some(i) = value.as_integer() {
            i.to_string()
        } else if let Some(b) = value.as_bool() {
            b.to_string()
        } else {
            return Err(StackError::InvalidConfig(format!(
                "env '{}' must be a string, integer or boolean",
                key
            )));
        };
        service.extra_environment.insert(key, value);
    }
    Ok(())
}

/// Durations are whole seconds
fn parse_health_check(node: &KdlNode, check: &mut HealthCheck) -> Result<()> {
    for child in children(node) {
        match child.name().value() {
            "path" => check.path = arg_str(child)?,
            "interval" => check.interval = Duration::from_secs(arg_int(child)?),
            "timeout" => check.timeout = Duration::from_secs(arg_int(child)?),
            "healthy-threshold" => check.healthy_threshold = arg_int(child)?,
            "unhealthy-threshold" => check.unhealthy_threshold = arg_int(child)?,
            "codes" => check.healthy_http_codes = arg_str(child)?,
            other => unknown_node("health-check", other),
        }
    }
    Ok(())
}
