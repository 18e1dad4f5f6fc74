// Graph construction
//
// 1. Register every scanned file as a node
// 2. Read source files (in parallel) and extract specifiers
// 3. Resolve relative specifiers against the node set and add edges
// 4. Optionally union edges reported by an external graph tool

use super::{EdgeOrigin, Resolution, SpecifierResolver, UsageGraph};
use crate::config::Config;
use crate::discovery::FileRecord;
use crate::parser::{ExtractorRegistry, Specifier};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A freshly built graph plus the files that could not be read
#[derive(Debug, Default)]
pub struct GraphBuild {
    pub graph: UsageGraph,
    pub warnings: Vec<String>,
}

pub struct GraphBuilder {
    root: PathBuf,
    registry: ExtractorRegistry,
    resolver: SpecifierResolver,
    source_extensions: HashSet<String>,
    parallel: bool,
}

impl GraphBuilder {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            registry: ExtractorRegistry::new(),
            resolver: SpecifierResolver::new(config),
            source_extensions: config
                .source_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            parallel: true,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build a graph from the current file list
    pub fn build(&self, files: &[FileRecord]) -> GraphBuild {
        let mut build = GraphBuild::default();
        for file in files {
            build.graph.add_node(&file.path);
        }
        let known: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();

        let sources: Vec<&FileRecord> = files
            .iter()
            .filter(|f| {
                f.extension()
                    .is_some_and(|ext| self.source_extensions.contains(&ext))
            })
            .collect();

        let extracted: Vec<(&str, Result<Vec<Specifier>, String>)> = if self.parallel {
            sources
                .par_iter()
                .map(|f| (f.path.as_str(), self.extract_file(f)))
                .collect()
        } else {
            sources
                .iter()
                .map(|f| (f.path.as_str(), self.extract_file(f)))
                .collect()
        };

        for (from, result) in extracted {
            let specifiers = match result {
                Ok(specs) => specs,
                Err(err) => {
                    warn!("Skipping extraction for {}: {}", from, err);
                    build.warnings.push(format!("{}: {}", from, err));
                    continue;
                }
            };

            for spec in specifiers {
                match self.resolver.resolve(from, &spec.raw, &known) {
                    Resolution::Local(to) => {
                        build.graph.add_edge(from, &to, EdgeOrigin::Static(spec.kind));
                    }
                    Resolution::Dangling(_) | Resolution::OutsideRoot => {
                        build.graph.record_unresolved(from, &spec.raw);
                    }
                    Resolution::Bare => build.graph.record_bare(&spec.raw),
                }
            }
        }

        info!(
            "Graph: {} nodes, {} edges ({} sources scanned)",
            build.graph.node_count(),
            build.graph.edge_count(),
            sources.len()
        );
        build
    }

    /// Union edges reported by an external tool. Never removes static edges.
    /// Returns the number of edges that were new.
    pub fn augment(&self, graph: &mut UsageGraph, edges: &[(String, String)]) -> usize {
        let mut added = 0;
        for (from, to) in edges {
            let (Some(from), Some(to)) = (super::normalize_path(from), super::normalize_path(to))
            else {
                continue;
            };
            if graph.add_edge(&from, &to, EdgeOrigin::External) {
                added += 1;
            }
        }
        debug!("External graph tool contributed {} new edges", added);
        added
    }

    fn extract_file(&self, file: &FileRecord) -> Result<Vec<Specifier>, String> {
        let path = file.absolute(&self.root);
        let source = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        let ext = file.extension().unwrap_or_default();
        Ok(self.registry.for_extension(&ext).extract(&source))
    }
}
