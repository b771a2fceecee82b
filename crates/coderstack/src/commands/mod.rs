pub mod plan;
pub mod synth;
pub mod validate;

use anyhow::Context;
use coderstack_cloud::StackEnv;
use coderstack_core::{CoderStack, StackConfig, load_config};
use colored::Colorize;
use std::path::PathBuf;

/// Global options shared by every command that builds the stack
pub struct BuildOptions {
    pub config: Option<PathBuf>,
    pub account: Option<String>,
    pub region: Option<String>,
    pub stack_name: Option<String>,
}

/// A built stack and the configuration it came from
pub struct Loaded {
    pub config: StackConfig,
    pub path: Option<PathBuf>,
    pub built: CoderStack,
}

impl Loaded {
    pub fn describe_source(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string().cyan().to_string(),
            None => "(built-in defaults)".dimmed().to_string(),
        }
    }
}

/// Load configuration and build the stack.
///
/// Flags and `CDK_DEFAULT_*` variables take precedence over the file.
pub fn build_stack(options: &BuildOptions) -> anyhow::Result<Loaded> {
    let (mut config, path) =
        load_config(options.config.as_deref()).context("failed to load configuration")?;

    if let Some(name) = &options.stack_name {
        config.name = name.clone();
    }
    tracing::debug!(stack = %config.name, "Resolved stack options");
    let env = StackEnv::new(
        options.account.clone().or_else(|| config.account.clone()),
        options.region.clone().or_else(|| config.region.clone()),
    )?;

    let built = CoderStack::build(&config, env).context("failed to build stack")?;
    Ok(Loaded {
        config,
        path,
        built,
    })
}
