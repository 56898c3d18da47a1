// src/lib.rs

//! In-process orchestration of extract/transform/load jobs whose inputs are
//! the outputs of other jobs.
//!
//! Jobs declare which producers they need ([`job::Dependencies`]); the
//! [`dag::JobRunner`] infers the graph from those declarations, runs every
//! producer before its consumers, caches results only while a queued consumer
//! still needs them, and separates real failures from inherited ones.

pub mod config;
pub mod dag;
pub mod errors;
pub mod job;
pub mod logging;
pub mod types;

pub use config::{ConfigFile, RunnerConfig};
pub use dag::{DependencyGraph, JobError, JobNode, JobRunner};
pub use errors::{EtlError, Result};
pub use job::{Dependencies, FnJob, Inputs, Job, JobId, Patch, Patched};
pub use types::{JobStatus, LogLevel, Stage, UncacheFailure};
