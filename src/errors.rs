// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! These are programmer / configuration errors and always reach the caller.
//! Failures raised by a job's own lifecycle never show up here: they are
//! caught per node and recorded as a [`crate::dag::JobError`].

use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("job '{job}' declares parameter '{param}' from '{producer}', which has no registered instance")]
    MissingDependency {
        job: JobId,
        param: String,
        producer: JobId,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cycle detected in job graph: {0}")]
    DependencyCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
