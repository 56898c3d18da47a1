// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::errors::Result;

/// Load a configuration file from a given path.
///
/// Missing sections and keys fall back to their defaults; unknown enum values
/// (e.g. `uncache_failure = "retry"`) are rejected by deserialization.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

/// Parse configuration from an in-memory TOML string.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Default config location: `Etldag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Etldag.toml")
}
