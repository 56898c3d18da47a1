// src/dag/validate.rs

//! Pre-flight checks run before any job executes.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::{DependencyGraph, Keyed};
use crate::dag::node::JobNode;
use crate::errors::{EtlError, Result};

/// Fail with [`EtlError::DependencyCycle`] if the graph has a cycle.
pub fn ensure_acyclic<T: Keyed>(graph: &DependencyGraph<T>) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut dag: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in graph.ids() {
        dag.add_node(id);
    }
    for (parent, child) in graph.edges() {
        dag.add_edge(parent, child, ());
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&dag, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(EtlError::DependencyCycle(format!(
                "cycle detected in job graph involving job '{}'",
                node
            )))
        }
    }
}

/// Every declared producer must exist and hold a job instance.
///
/// A producer declared only by key gets a node without an instance; running
/// it is impossible, so the first consumer that declared it is reported.
pub fn ensure_producers_present(graph: &DependencyGraph<JobNode>) -> Result<()> {
    for node in graph.nodes() {
        let Some(job) = node.job() else {
            continue;
        };

        for dep in job.dependencies().iter() {
            let producer_ready = graph
                .get(&dep.producer)
                .map(|p| p.job().is_some())
                .unwrap_or(false);

            if !producer_ready {
                return Err(EtlError::MissingDependency {
                    job: node.id().to_string(),
                    param: dep.param.clone(),
                    producer: dep.producer.clone(),
                });
            }
        }
    }

    Ok(())
}
