//! Colored round and run summaries for stdout

use super::colors::{format_bytes, BoxChars, StatusSymbol, StructureColors, TierBadge};
use super::{FinalReport, RoundReport, StopReason};
use crate::quarantine::RestoreReport;
use colored::Colorize;

pub struct TerminalReporter {
    /// Candidates listed per round before collapsing
    max_listed: usize,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { max_listed: 20 }
    }

    pub fn with_max_listed(mut self, max_listed: usize) -> Self {
        self.max_listed = max_listed;
        self
    }

    pub fn round(&self, round: &RoundReport) {
        println!();
        println!(
            "{} {}",
            StructureColors::header(&format!("Round {}", round.round_number)),
            BoxChars::light_line(40).dimmed()
        );
        println!(
            "  {} files, {} edges, {} candidates, {} moved ({})",
            StructureColors::count(&round.files_scanned.to_string()),
            StructureColors::count(&round.graph_edge_count.to_string()),
            StructureColors::count(&round.candidate_count.to_string()),
            StructureColors::count(&round.moved_count.to_string()),
            format_bytes(round.bytes_quarantined).dimmed()
        );

        for candidate in round.candidates.iter().take(self.max_listed) {
            println!(
                "    {} {}",
                TierBadge::colored(candidate.tier),
                StructureColors::file_path(&candidate.path)
            );
        }
        if round.candidates.len() > self.max_listed {
            println!(
                "    {}",
                format!("... and {} more", round.candidates.len() - self.max_listed).dimmed()
            );
        }

        let tools = &round.tool_results;
        println!(
            "  {} format  {} lint  {} typecheck  {} test  {} schema",
            StatusSymbol::colored(tools.format),
            StatusSymbol::colored(tools.lint),
            StatusSymbol::colored(tools.typecheck),
            StatusSymbol::colored(tools.test),
            StatusSymbol::colored(tools.schema_pull),
        );

        for path in &round.manual_review {
            println!("  {} manual review: {}", "⚠".yellow(), path);
        }
        for err in &round.phase_errors {
            println!("  {} {}: {}", "✖".red(), err.phase, err.message.dimmed());
        }

        if round.stability.stable {
            println!("  {}", "stable".green().bold());
        } else {
            println!(
                "  {} {}",
                "unstable:".yellow(),
                round.stability.reasons.join("; ").dimmed()
            );
        }
    }

    pub fn final_summary(&self, report: &FinalReport) {
        let summary = &report.summary;
        let label_width = 20;

        println!();
        println!("{}", "Repository Hygiene Summary".cyan().bold());
        println!("{}", BoxChars::heavy_line(50));

        let rows = [
            ("Run:", report.run_id.clone()),
            ("Rounds:", summary.total_rounds.to_string()),
            ("Files moved:", summary.total_moved.to_string()),
            ("Space recovered:", format_bytes(summary.bytes_quarantined)),
            ("Manual review:", summary.manual_review_count.to_string()),
            ("Stopped:", summary.stop_reason.as_str().to_string()),
        ];
        for (label, value) in rows {
            println!(
                "{:>width$}  {}",
                label.dimmed(),
                StructureColors::count(&value),
                width = label_width
            );
        }
        if let Some(bundle) = &summary.rollback_bundle {
            println!(
                "{:>width$}  {}",
                "Rollback bundle:".dimmed(),
                StructureColors::file_path(bundle),
                width = label_width
            );
        }

        if let Some(last) = report.rounds.last() {
            let tools = &last.tool_results;
            for (name, status) in [
                ("format", tools.format),
                ("lint", tools.lint),
                ("typecheck", tools.typecheck),
                ("test", tools.test),
                ("schema pull", tools.schema_pull),
            ] {
                println!(
                    "{:>width$}  {}",
                    format!("{}:", name).dimmed(),
                    StatusSymbol::label(status),
                    width = label_width
                );
            }
        }

        println!("{}", BoxChars::light_line(50).dimmed());
        match (summary.final_stable, summary.stop_reason) {
            (_, StopReason::DryRun) => {
                println!("{}", "Dry run: nothing was moved".dimmed());
            }
            (true, _) => println!("{}", "Repository converged".green().bold()),
            (false, _) => println!(
                "{}",
                "Repository did not converge; see the report for details".yellow()
            ),
        }
        println!(
            "{}",
            format!("Restore with: repohygiene --restore {}", report.run_id).dimmed()
        );
    }

    pub fn restore(&self, report: &RestoreReport) {
        println!(
            "{} {} restored, {} failed",
            StructureColors::header(&format!("Run {}", report.run_id)),
            StructureColors::count(&report.restored.len().to_string()),
            StructureColors::count(&report.failed.len().to_string())
        );
        for (path, err) in &report.failed {
            println!("  {} {}: {}", "✖".red(), path, err.dimmed());
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
