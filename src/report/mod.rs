//! Round and run reports
//!
//! Rounds are appended as they complete and the run report is rewritten after
//! each one, so a crash mid-run still leaves every finished round on disk.
//! `finalize` adds the summary and publishes the report.

mod colors;
mod terminal;

pub use terminal::TerminalReporter;

use crate::analysis::Candidate;
use crate::artifact::write_json_atomic;
use crate::error::FatalSetupError;
use crate::quarantine::QuarantineEntry;
use crate::tools::{Outcome, TestCounts, ToolRun, ToolStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const RUN_REPORT_FILE_NAME: &str = "report.json";
pub const FINAL_REPORT_FILE_NAME: &str = "final_report.json";

/// Per-tool status, as consumed by the stability rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResults {
    pub lint: ToolStatus,
    pub format: ToolStatus,
    pub typecheck: ToolStatus,
    pub test: ToolStatus,
    pub schema_pull: ToolStatus,
}

impl Default for ToolResults {
    fn default() -> Self {
        Self {
            lint: ToolStatus::Skipped,
            format: ToolStatus::Skipped,
            typecheck: ToolStatus::Skipped,
            test: ToolStatus::Skipped,
            schema_pull: ToolStatus::Skipped,
        }
    }
}

/// Skip reason, error and output tail for one tool or generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetail {
    pub tool: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<ToolRun>,
}

impl ToolDetail {
    pub fn from_outcome(tool: &str, outcome: &Outcome<ToolRun>) -> Self {
        Self {
            tool: tool.to_string(),
            status: outcome.status(),
            detail: outcome.detail().map(str::to_string),
            run: outcome.value().cloned(),
        }
    }

    /// Detail for outcomes that carry no command output
    pub fn from_status<T>(tool: &str, outcome: &Outcome<T>) -> Self {
        Self {
            tool: tool.to_string(),
            status: outcome.status(),
            detail: outcome.detail().map(str::to_string),
            run: None,
        }
    }
}

/// A phase that failed without aborting the round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseError {
    pub phase: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityVerdict {
    pub stable: bool,
    /// Why the round was not stable; empty when stable
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReport {
    pub round_number: u32,
    pub timestamp: DateTime<Utc>,
    pub files_scanned: usize,
    pub graph_node_count: usize,
    pub graph_edge_count: usize,
    pub external_edges_added: usize,
    pub unresolved_count: usize,
    pub candidate_count: usize,
    pub moved_count: usize,
    pub bytes_quarantined: u64,
    pub candidates: Vec<Candidate>,
    pub entries: Vec<QuarantineEntry>,
    /// Original paths whose move could not be verified
    pub manual_review: Vec<String>,
    pub tool_results: ToolResults,
    pub tool_details: Vec<ToolDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_counts: Option<TestCounts>,
    pub generators: Vec<ToolDetail>,
    pub phase_errors: Vec<PhaseError>,
    pub stability: StabilityVerdict,
}

impl RoundReport {
    pub fn new(round_number: u32) -> Self {
        Self {
            round_number,
            timestamp: Utc::now(),
            files_scanned: 0,
            graph_node_count: 0,
            graph_edge_count: 0,
            external_edges_added: 0,
            unresolved_count: 0,
            candidate_count: 0,
            moved_count: 0,
            bytes_quarantined: 0,
            candidates: Vec::new(),
            entries: Vec::new(),
            manual_review: Vec::new(),
            tool_results: ToolResults::default(),
            tool_details: Vec::new(),
            test_counts: None,
            generators: Vec::new(),
            phase_errors: Vec::new(),
            stability: StabilityVerdict::default(),
        }
    }

    pub fn record_phase_error(&mut self, phase: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("Round {} phase '{}' failed: {}", self.round_number, phase, message);
        self.phase_errors.push(PhaseError {
            phase: phase.to_string(),
            message,
        });
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    InProgress,
    /// A stable round at or past the minimum round count
    Converged,
    MaxRounds,
    Cancelled,
    DryRun,
    SetupFailed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::InProgress => "in progress",
            StopReason::Converged => "converged",
            StopReason::MaxRounds => "round limit reached",
            StopReason::Cancelled => "cancelled",
            StopReason::DryRun => "dry run",
            StopReason::SetupFailed => "setup failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_rounds: usize,
    pub total_moved: usize,
    pub final_stable: bool,
    pub bytes_quarantined: u64,
    pub manual_review_count: usize,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub rounds: Vec<RoundReport>,
    pub summary: RunSummary,
}

/// Accumulates rounds for one run and persists them
#[derive(Debug)]
pub struct ReportGenerator {
    run_id: String,
    run_report_path: PathBuf,
    final_report_path: PathBuf,
    rounds: Vec<RoundReport>,
}

impl ReportGenerator {
    pub fn new(run_id: &str, run_report_path: &Path, final_report_path: &Path) -> Self {
        Self {
            run_id: run_id.to_string(),
            run_report_path: run_report_path.to_path_buf(),
            final_report_path: final_report_path.to_path_buf(),
            rounds: Vec::new(),
        }
    }

    pub fn rounds(&self) -> &[RoundReport] {
        &self.rounds
    }

    /// Record a completed round and rewrite the in-progress report. A write
    /// failure here is only logged; `finalize` retries.
    pub fn append(&mut self, round: RoundReport) {
        debug!("Recording round {}", round.round_number);
        self.rounds.push(round);
        let snapshot = self.build(StopReason::InProgress, None, None);
        if let Err(err) = write_json_atomic(&self.run_report_path, &snapshot) {
            warn!(
                "Could not update {}: {}",
                self.run_report_path.display(),
                err
            );
        }
    }

    pub fn summarize(
        &self,
        stop_reason: StopReason,
        rollback_bundle: Option<String>,
        setup_error: Option<String>,
    ) -> RunSummary {
        RunSummary {
            total_rounds: self.rounds.len(),
            total_moved: self.rounds.iter().map(|r| r.moved_count).sum(),
            final_stable: self.rounds.last().is_some_and(|r| r.stability.stable),
            bytes_quarantined: self.rounds.iter().map(|r| r.bytes_quarantined).sum(),
            manual_review_count: self.rounds.iter().map(|r| r.manual_review.len()).sum(),
            stop_reason,
            rollback_bundle,
            setup_error,
        }
    }

    /// Write the final report to the run directory and the state root.
    /// Works with any number of rounds, including none.
    pub fn finalize(
        &self,
        stop_reason: StopReason,
        rollback_bundle: Option<String>,
        setup_error: Option<String>,
    ) -> Result<FinalReport, FatalSetupError> {
        let report = self.build(stop_reason, rollback_bundle, setup_error);
        for path in [&self.run_report_path, &self.final_report_path] {
            write_json_atomic(path, &report).map_err(|e| FatalSetupError::Report {
                path: path.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(report)
    }

    fn build(
        &self,
        stop_reason: StopReason,
        rollback_bundle: Option<String>,
        setup_error: Option<String>,
    ) -> FinalReport {
        FinalReport {
            generated_at: Utc::now(),
            run_id: self.run_id.clone(),
            rounds: self.rounds.clone(),
            summary: self.summarize(stop_reason, rollback_bundle, setup_error),
        }
    }
}
