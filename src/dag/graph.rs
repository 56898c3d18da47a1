// src/dag/graph.rs

use std::collections::HashMap;

use crate::errors::{EtlError, Result};

/// Anything stored in a [`DependencyGraph`] must expose its key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Internal node structure: stores the payload plus immediate parents and
/// children.
#[derive(Debug, Clone)]
struct GraphNode<T> {
    data: T,
    /// Producers: nodes that must finish before this one.
    parents: Vec<String>,
    /// Consumers: nodes that list this one as a parent.
    children: Vec<String>,
}

impl<T> GraphNode<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// In-memory poly-tree keyed by node id: a node may have many parents as
/// well as many children.
///
/// Acyclicity is not enforced on insertion; see
/// [`crate::dag::validate::ensure_acyclic`]. Iteration follows insertion
/// order so diagnostics are reproducible.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T> {
    nodes: HashMap<String, GraphNode<T>>,
    order: Vec<String>,
}

impl<T> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Keyed> DependencyGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node`, or replace the data of the node with the same key,
    /// and make `parents` its exact parent set.
    ///
    /// Parents not yet in the graph are inserted as given; parents already
    /// present keep their data.
    pub fn add_node(&mut self, node: T, parents: impl IntoIterator<Item = T>) {
        let id = node.key().to_string();
        match self.nodes.get_mut(&id) {
            Some(existing) => existing.data = node,
            None => self.push(id.clone(), node),
        }
        self.link(&id, parents);
    }

    /// Insert `node` only if its key is unseen. Returns whether it was added.
    pub fn insert_if_absent(&mut self, node: T) -> bool {
        let id = node.key().to_string();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.push(id, node);
        true
    }

    /// Replace the parent set of an existing node, inserting unseen parents.
    ///
    /// Unknown `id`s are ignored.
    pub fn link(&mut self, id: &str, parents: impl IntoIterator<Item = T>) {
        if !self.nodes.contains_key(id) {
            return;
        }

        let mut parent_ids: Vec<String> = Vec::new();
        for parent in parents {
            let pid = parent.key().to_string();
            self.insert_if_absent(parent);
            if !parent_ids.contains(&pid) {
                parent_ids.push(pid);
            }
        }

        let old = self
            .nodes
            .get_mut(id)
            .map(|n| std::mem::take(&mut n.parents))
            .unwrap_or_default();
        for pid in &old {
            if let Some(parent) = self.nodes.get_mut(pid) {
                parent.children.retain(|c| c != id);
            }
        }

        for pid in &parent_ids {
            if let Some(parent) = self.nodes.get_mut(pid) {
                if !parent.children.iter().any(|c| c == id) {
                    parent.children.push(id.to_string());
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.parents = parent_ids;
        }
    }

    fn push(&mut self, id: String, data: T) {
        self.order.push(id.clone());
        self.nodes.insert(id, GraphNode::new(data));
    }
}

impl<T> DependencyGraph<T> {
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<&T> {
        self.slot(id).map(|n| &n.data)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut T> {
        self.nodes
            .get_mut(id)
            .map(|n| &mut n.data)
            .ok_or_else(|| EtlError::NotFound(id.to_string()))
    }

    /// Ids of the immediate parents of `id`.
    pub fn parents(&self, id: &str) -> Result<&[String]> {
        self.slot(id).map(|n| n.parents.as_slice())
    }

    /// Ids of the immediate children of `id`.
    pub fn children(&self, id: &str) -> Result<&[String]> {
        self.slot(id).map(|n| n.children.as_slice())
    }

    pub fn parent_nodes(&self, id: &str) -> Result<Vec<&T>> {
        let parents = self.parents(id)?;
        Ok(parents.iter().filter_map(|p| self.get(p).ok()).collect())
    }

    pub fn child_nodes(&self, id: &str) -> Result<Vec<&T>> {
        let children = self.children(id)?;
        Ok(children.iter().filter_map(|c| self.get(c).ok()).collect())
    }

    /// Ids of nodes nothing depends on.
    pub fn sink_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.children.is_empty()))
            .cloned()
            .collect()
    }

    /// Ids of nodes that depend on nothing.
    pub fn root_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.parents.is_empty()))
            .cloned()
            .collect()
    }

    pub fn sink_nodes(&self) -> Vec<&T> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.children.is_empty())
            .map(|n| &n.data)
            .collect()
    }

    /// All node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| &n.data)
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.nodes.values_mut().map(|n| &mut n.data)
    }

    /// Every path from a root (a node without parents) down to `id`.
    ///
    /// Each path is ordered root first and ends with `id`. A root yields the
    /// single path `[id]`.
    pub fn all_paths(&self, id: &str) -> Result<Vec<Vec<String>>> {
        self.slot(id)?;
        let mut paths = Vec::new();
        let mut suffix = Vec::new();
        self.collect_paths(id, &mut suffix, &mut paths);
        Ok(paths)
    }

    /// Walk parents depth-first, carrying the path from `id` back to the
    /// target in `suffix`. Nodes already on the path are skipped.
    fn collect_paths(&self, id: &str, suffix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        suffix.push(id.to_string());
        if node.parents.is_empty() {
            out.push(suffix.iter().rev().cloned().collect());
        } else {
            for parent in &node.parents {
                if !suffix.contains(parent) {
                    self.collect_paths(parent, suffix, out);
                }
            }
        }
        suffix.pop();
    }

    /// Every `(parent, child)` edge, grouped by child in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get_key_value(id))
            .flat_map(|(id, n)| n.parents.iter().map(move |p| (p.as_str(), id.as_str())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove `id` along with every edge touching it and return its data.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|o| o != id);

        for pid in &node.parents {
            if let Some(parent) = self.nodes.get_mut(pid) {
                parent.children.retain(|c| c != id);
            }
        }
        for cid in &node.children {
            if let Some(child) = self.nodes.get_mut(cid) {
                child.parents.retain(|p| p != id);
            }
        }

        Some(node.data)
    }

    /// Remove every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
    }

    fn slot(&self, id: &str) -> Result<&GraphNode<T>> {
        self.nodes
            .get(id)
            .ok_or_else(|| EtlError::NotFound(id.to_string()))
    }
}
