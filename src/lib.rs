//! Repohygiene - self-healing repository hygiene for JavaScript/TypeScript trees
//!
//! Repeatedly finds files nothing references, moves them into a timestamped
//! quarantine instead of deleting them, and re-runs the repository's own
//! quality tools until the tree stops changing.
//!
//! # Architecture
//!
//! Each round of the convergence loop runs:
//! 1. **File Discovery** - Walk the live tree, skipping ignored and own directories
//! 2. **Specifier Extraction** - Pull import-like string literals out of sources
//! 3. **Graph Building** - Resolve relative specifiers into a usage graph
//! 4. **Reachability Analysis** - Split files into referenced and candidates
//! 5. **Quarantine** - Move candidates out with verified copies and a restore index
//! 6. **Tools** - Format, lint, typecheck, generators, tests, schema pull
//! 7. **Evaluation** - Decide whether the round was stable
//!
//! Per-round and final reports are written as JSON under the state directory.

pub mod analysis;
pub mod artifact;
pub mod config;
pub mod convergence;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod lock;
pub mod parser;
pub mod quarantine;
pub mod report;
pub mod tools;

pub use analysis::{Candidate, CandidateTier, ReachabilityAnalyzer};
pub use config::Config;
pub use convergence::{ConvergenceController, RunContext};
pub use discovery::{FileFinder, FileRecord};
pub use error::FatalSetupError;
pub use graph::{GraphBuilder, UsageGraph};
pub use quarantine::{QuarantineEntry, QuarantineManager, RestoreIndex};
pub use report::{FinalReport, ReportGenerator, RoundReport};
pub use tools::{Outcome, ToolSuite};
