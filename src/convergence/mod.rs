//! Convergence loop
//!
//! ```text
//! Idle -> RunningRound(1) -> Evaluating(1) -> RunningRound(2) -> ... -> Finalizing -> Done
//! ```
//!
//! After `Evaluating(n)` the controller stops when the round was stable and
//! at least `min_rounds_before_stop` rounds ran, or when `n` reached
//! `max_rounds`. `Finalizing` always runs.

mod context;
mod controller;

pub use context::{new_run_id, CancelFlag, RunContext, RunPaths};
pub use controller::ConvergenceController;

use crate::report::{RoundReport, StabilityVerdict, StopReason};
use crate::tools::ToolStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    RunningRound(u32),
    Evaluating(u32),
    Finalizing,
    Done,
}

/// Transition out of `Evaluating(round)`
pub fn next_state(stable: bool, round: u32, min_rounds: u32, max_rounds: u32) -> ControllerState {
    if (stable && round >= min_rounds) || round >= max_rounds {
        ControllerState::Finalizing
    } else {
        ControllerState::RunningRound(round + 1)
    }
}

/// Why a run that reached `Finalizing` after `round` stopped
pub fn stop_reason(stable: bool, round: u32, min_rounds: u32) -> StopReason {
    if stable && round >= min_rounds {
        StopReason::Converged
    } else {
        StopReason::MaxRounds
    }
}

/// A round is stable when no quality tool failed, no test failed and no
/// candidate was found. Skipped tools never block.
pub fn evaluate_stability(round: &RoundReport) -> StabilityVerdict {
    let mut reasons = Vec::new();
    let tools = &round.tool_results;

    for (name, status) in [
        ("lint", tools.lint),
        ("format", tools.format),
        ("typecheck", tools.typecheck),
    ] {
        if status == ToolStatus::Failed {
            reasons.push(format!("{} failed", name));
        }
    }

    match (tools.test, round.test_counts) {
        (_, Some(counts)) if counts.failed > 0 => {
            reasons.push(format!("{} test(s) failed", counts.failed));
        }
        (ToolStatus::Failed, _) => reasons.push("test runner failed".to_string()),
        _ => {}
    }

    if round.candidate_count > 0 {
        reasons.push(format!("{} candidate(s) found", round.candidate_count));
    }

    StabilityVerdict {
        stable: reasons.is_empty(),
        reasons,
    }
}
