use std::path::PathBuf;

use anyhow::{Context, Result};
use framework_patcher_core::config::{Config, DEFAULT_CONFIG_PATH};

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<PathBuf, String> { Ok(PathBuf::from(value)) }

pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = path.cloned().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}
