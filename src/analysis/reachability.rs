//! Reachability analysis
//!
//! A file is referenced when it is an edge target, matches a protected
//! pattern, or lies under an excluded root. Everything else is a candidate.
//! Reachability is edge-based, not root-based: two files importing only each
//! other keep each other alive.

use super::{
    Candidate, CandidateTier, JunkHeuristic, Partition, ProtectionRules, ReferenceReason,
    ReferencedFile,
};
use crate::config::Config;
use crate::discovery::FileRecord;
use crate::error::FatalSetupError;
use crate::graph::UsageGraph;
use tracing::{debug, info};

pub struct ReachabilityAnalyzer {
    rules: ProtectionRules,
    junk: JunkHeuristic,
}

impl ReachabilityAnalyzer {
    pub fn new(rules: ProtectionRules, junk: JunkHeuristic) -> Self {
        Self { rules, junk }
    }

    pub fn from_config(config: &Config) -> Result<Self, FatalSetupError> {
        Ok(Self::new(
            ProtectionRules::from_config(config)?,
            JunkHeuristic::new(&config.junk_patterns),
        ))
    }

    pub fn analyze(&self, files: &[FileRecord], graph: &UsageGraph, round: u32) -> Partition {
        let mut partition = Partition::default();

        for file in files {
            if let Some(reason) = self.reference_reason(&file.path, graph) {
                partition.referenced.push(ReferencedFile {
                    path: file.path.clone(),
                    reason,
                });
                continue;
            }

            let tier = if self.junk.matches(&file.path) {
                CandidateTier::LikelyJunk
            } else {
                CandidateTier::Unreferenced
            };
            debug!("Candidate {} ({})", file.path, tier);

            partition.candidates.push(Candidate {
                path: file.path.clone(),
                discovered_round: round,
                protected_match: false,
                tier,
                size_bytes: file.size_bytes,
            });
        }

        info!(
            "Round {}: {} referenced, {} candidates ({} likely junk)",
            round,
            partition.referenced.len(),
            partition.candidates.len(),
            partition.count_by_tier(CandidateTier::LikelyJunk)
        );
        partition
    }

    fn reference_reason(&self, path: &str, graph: &UsageGraph) -> Option<ReferenceReason> {
        if graph.is_edge_target(path) {
            return Some(ReferenceReason::EdgeTarget);
        }
        if let Some(pattern) = self.rules.protected_by(path) {
            return Some(ReferenceReason::Protected(pattern.to_string()));
        }
        self.rules
            .excluded_root(path)
            .map(|root| ReferenceReason::ExcludedRoot(root.to_string()))
    }
}
