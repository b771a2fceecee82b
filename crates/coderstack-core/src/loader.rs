//! Configuration loading

use crate::error::Result;
use crate::model::StackConfig;
use crate::parser::parse_kdl_file;
use coderstack_config::{ConfigError, find_config_file};
use std::path::{Path, PathBuf};

/// Find and parse the configuration file.
///
/// Returns the built-in defaults (and no path) when no file is found. An
/// explicitly requested file that does not exist is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<(StackConfig, Option<PathBuf>)> {
    match find_config_file(explicit) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            let config = parse_kdl_file(&path)?;
            Ok((config, Some(path)))
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No configuration file found, using defaults");
            Ok((StackConfig::default(), None))
        }
        Err(e) => Err(e.into()),
    }
}
