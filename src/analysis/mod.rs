// Reachability analysis - partitions the tree into referenced files and
// quarantine candidates for one round.

mod policy;
mod reachability;

pub use policy::{JunkHeuristic, ProtectionRules};
pub use reachability::ReachabilityAnalyzer;

use serde::{Deserialize, Serialize};

/// Why a candidate was picked
///
/// Both tiers are quarantined; the tier only helps a reviewer prioritise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateTier {
    /// Filename looks like a mock, fixture, backup or scratch file
    LikelyJunk,
    /// Nothing references it and no rule protects it
    Unreferenced,
}

impl CandidateTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateTier::LikelyJunk => "likely-junk",
            CandidateTier::Unreferenced => "unreferenced",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CandidateTier::LikelyJunk => "unreferenced file with a mock/test/backup style name",
            CandidateTier::Unreferenced => "file is never referenced and matches no protection rule",
        }
    }
}

impl std::fmt::Display for CandidateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file judged unreferenced in the current round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub path: String,
    pub discovered_round: u32,
    /// Always false for emitted candidates; protected files are never candidates
    pub protected_match: bool,
    pub tier: CandidateTier,
    pub size_bytes: u64,
}

/// Why a file counts as referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum ReferenceReason {
    /// Target of at least one resolved edge
    EdgeTarget,
    /// Matches a protected pattern
    Protected(String),
    /// Lies under an excluded root
    ExcludedRoot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedFile {
    pub path: String,
    pub reason: ReferenceReason,
}

/// Result of one reachability pass
#[derive(Debug, Default)]
pub struct Partition {
    pub referenced: Vec<ReferencedFile>,
    pub candidates: Vec<Candidate>,
}

impl Partition {
    pub fn candidate_paths(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.path.as_str()).collect()
    }

    pub fn count_by_tier(&self, tier: CandidateTier) -> usize {
        self.candidates.iter().filter(|c| c.tier == tier).count()
    }
}
