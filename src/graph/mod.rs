//! Usage graph
//!
//! Nodes are repository-relative file paths, edges are `source -> resolved
//! specifier`. The graph is rebuilt from the live tree every round and never
//! mutated incrementally across rounds.

mod builder;
mod resolve;
mod snapshot;

pub use builder::{GraphBuild, GraphBuilder};
pub use resolve::{normalize_path, Resolution, SpecifierResolver};
pub use snapshot::{GraphSnapshot, SnapshotEdge};

use crate::parser::SpecifierKind;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Where an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeOrigin {
    Static(SpecifierKind),
    /// Reported by an external graph tool
    External,
}

/// A relative specifier that matched no file in the tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnresolvedSpecifier {
    pub from: String,
    pub specifier: String,
}

#[derive(Debug, Default)]
pub struct UsageGraph {
    graph: DiGraph<String, EdgeOrigin>,
    index: HashMap<String, NodeIndex>,
    unresolved: BTreeSet<UnresolvedSpecifier>,
    /// Bare specifier -> number of files importing it
    bare: BTreeMap<String, usize>,
}

impl UsageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Add `from -> to` between existing nodes. Returns false if either node
    /// is missing or the edge is already present.
    pub fn add_edge(&mut self, from: &str, to: &str, origin: EdgeOrigin) -> bool {
        let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, origin);
        true
    }

    pub fn record_unresolved(&mut self, from: &str, specifier: &str) {
        self.unresolved.insert(UnresolvedSpecifier {
            from: from.to_string(),
            specifier: specifier.to_string(),
        });
    }

    pub fn record_bare(&mut self, specifier: &str) {
        *self.bare.entry(specifier.to_string()).or_default() += 1;
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Ordered edge set, used for snapshots and equality checks
    pub fn edge_set(&self) -> BTreeSet<(String, String)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone()))
            .collect()
    }

    /// True if some other file has an edge to `path`. Self-imports do not count.
    pub fn is_edge_target(&self, path: &str) -> bool {
        let Some(&idx) = self.index.get(path) else {
            return false;
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .any(|src| src != idx)
    }

    /// Files that reference `path`
    pub fn referrers(&self, path: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter(|src| *src != idx)
            .map(|src| self.graph[src].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &UnresolvedSpecifier> {
        self.unresolved.iter()
    }

    pub fn bare_specifiers(&self) -> &BTreeMap<String, usize> {
        &self.bare
    }

    pub fn snapshot(&self, round: u32) -> GraphSnapshot {
        GraphSnapshot::from_graph(self, round)
    }

    pub(crate) fn edges_with_origin(&self) -> Vec<(String, String, EdgeOrigin)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                    *e.weight(),
                )
            })
            .collect();
        edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        edges
    }
}
