//! Configuration loading for CLI commands

use anyhow::{Context, Result};
use glof_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "glof.toml";

/// Locate the configuration file.
///
/// An explicit path must exist. Otherwise the nearest `glof.toml` in the
/// current directory or one of its ancestors is used, if any.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let mut current = std::env::current_dir()?;
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        if !current.pop() {
            return Ok(None);
        }
    }
}

/// Defaults, then the config file, then `GLOF_*` variables, then CLI flags
pub fn load_config(explicit: Option<&Path>, overrides: CliConfigOverrides) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();
    if let Some(path) = find_config_file(explicit)? {
        tracing::debug!(path = %path.display(), "Loading configuration file");
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }
    let mut config = config.load_from_env();
    config.update_from_cli(overrides)?;
    Ok(config)
}
