// src/config/model.rs

use serde::Deserialize;

use crate::types::{LogLevel, UncacheFailure};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// caching = true
/// uncache_failure = "fail"
///
/// [log]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Scheduler behaviour from `[runner]`.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Logging from `[log]`.
    #[serde(default)]
    pub log: LogSection,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Whether `cache()` / `uncache()` are invoked at all.
    ///
    /// With `false`, producers never cache and consumers never release.
    #[serde(default = "default_caching")]
    pub caching: bool,

    /// Policy for a failing `uncache()` hook.
    #[serde(default)]
    pub uncache_failure: UncacheFailure,
}

fn default_caching() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            caching: default_caching(),
            uncache_failure: UncacheFailure::default(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    /// If `None`, `ETLDAG_LOG` or `info` is used.
    #[serde(default)]
    pub level: Option<LogLevel>,
}
