// src/config/mod.rs

//! Configuration loading for etldag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk or a string (`loader.rs`).
//!
//! Nothing here is global: callers hand the resulting [`RunnerConfig`] to
//! [`crate::dag::JobRunner::with_config`] explicitly.

pub mod loader;
pub mod model;

pub use loader::{default_config_path, load_from_path, load_from_str};
pub use model::{ConfigFile, LogSection, RunnerConfig};
