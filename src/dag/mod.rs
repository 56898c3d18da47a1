// src/dag/mod.rs

//! Job graph representation and scheduling.
//!
//! - [`graph`] holds a generic poly-tree keyed by node id.
//! - [`node`] wraps a job with its run status and failure.
//! - [`runner`] builds the graph from jobs and executes it.
//! - [`diagnostics`] answers "what failed, and why" after a run.
//! - [`validate`] holds the checks that run before any job does.

pub mod diagnostics;
pub mod graph;
pub mod node;
pub mod runner;
pub mod validate;

pub use graph::{DependencyGraph, Keyed};
pub use node::{JobError, JobNode};
pub use runner::JobRunner;
