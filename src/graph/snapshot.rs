//! Per-round graph snapshots for auditing

use super::{EdgeOrigin, UnresolvedSpecifier, UsageGraph};
use crate::artifact::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: String,
    pub to: String,
    pub origin: EdgeOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub round: u32,
    pub generated_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<String>,
    pub edges: Vec<SnapshotEdge>,
    pub unresolved: Vec<UnresolvedSpecifier>,
    pub bare_specifier_count: usize,
}

impl GraphSnapshot {
    pub fn from_graph(graph: &UsageGraph, round: u32) -> Self {
        let mut nodes: Vec<String> = graph.nodes().map(str::to_string).collect();
        nodes.sort();
        let edges = graph
            .edges_with_origin()
            .into_iter()
            .map(|(from, to, origin)| SnapshotEdge { from, to, origin })
            .collect();

        Self {
            round,
            generated_at: Utc::now(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            nodes,
            edges,
            unresolved: graph.unresolved().cloned().collect(),
            bare_specifier_count: graph.bare_specifiers().len(),
        }
    }

    /// File name used inside a run's state directory
    pub fn file_name(round: u32) -> String {
        format!("graph-round-{:02}.json", round)
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        write_json_atomic(path, self)
    }
}
