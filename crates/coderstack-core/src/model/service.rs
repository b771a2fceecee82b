//! Fargate service configuration

use crate::error::{Result, StackError};
use crate::health::HealthCheck;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuArchitecture {
    Arm64,
    X86_64,
}

impl CpuArchitecture {
    /// Value used by `RuntimePlatform.CpuArchitecture`
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuArchitecture::Arm64 => "ARM64",
            CpuArchitecture::X86_64 => "X86_64",
        }
    }
}

impl std::str::FromStr for CpuArchitecture {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "arm64" => Ok(CpuArchitecture::Arm64),
            "x86_64" | "x86-64" | "amd64" => Ok(CpuArchitecture::X86_64),
            other => Err(StackError::InvalidConfig(format!(
                "unknown CPU architecture: {}",
                other
            ))),
        }
    }
}

/// coderd container service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub image: String,
    pub container_name: String,
    pub container_port: u16,

    /// Task CPU units
    pub cpu: u32,

    /// Task memory in MiB
    pub memory_mib: u32,

    pub desired_count: u32,
    pub cpu_architecture: CpuArchitecture,
    pub assign_public_ip: bool,

    /// `CODER_PROVISIONER_DAEMONS`
    pub provisioner_daemons: u32,

    /// `CODER_DISABLE_PASSWORD_AUTH`
    pub disable_password_auth: bool,

    /// `CODER_PROXY_TRUSTED_HEADERS`
    pub trusted_proxy_header: String,

    /// `CODER_DERP_CONFIG_URL`
    pub derp_config_url: String,

    /// Additional container environment; may not shadow managed variables
    pub extra_environment: BTreeMap<String, String>,

    pub health_check: HealthCheck,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image: "ghcr.io/coder/coder:v2.21.3".to_string(),
            container_name: "coder".to_string(),
            container_port: 8080,
            cpu: 2048,
            memory_mib: 4096,
            desired_count: 1,
            cpu_architecture: CpuArchitecture::Arm64,
            assign_public_ip: true,
            provisioner_daemons: 3,
            disable_password_auth: true,
            trusted_proxy_header: "X-Forwarded-For".to_string(),
            derp_config_url: "https://controlplane.tailscale.com/derpmap/default".to_string(),
            extra_environment: BTreeMap::new(),
            health_check: HealthCheck::default(),
        }
    }
}

impl ServiceConfig {
    /// Check the CPU/memory pair against the Fargate task sizes
    pub fn validate_task_size(&self) -> Result<()> {
        let (min, max, step) = match self.cpu {
            256 => {
                return if [512, 1024, 2048].contains(&self.memory_mib) {
                    Ok(())
                } else {
                    Err(task_size_error(self.cpu, self.memory_mib))
                };
            }
            512 => (1024, 4096, 1024),
            1024 => (2048, 8192, 1024),
            2048 => (4096, 16384, 1024),
            4096 => (8192, 30720, 1024),
            8192 => (16384, 61440, 4096),
            16384 => (32768, 122880, 8192),
            cpu => {
                return Err(StackError::InvalidConfig(format!(
                    "unsupported Fargate CPU value: {}",
                    cpu
                )));
            }
        };

        let memory = self.memory_mib;
        if memory < min || memory > max || (memory - min) % step != 0 {
            return Err(task_size_error(self.cpu, memory));
        }
        Ok(())
    }
}

fn task_size_error(cpu: u32, memory: u32) -> StackError {
    StackError::InvalidConfig(format!(
        "{} MiB of memory is not available with {} CPU units on Fargate",
        memory, cpu
    ))
}
