// Round pipeline
//
// scan -> graph (+ external edges, snapshot) -> analyze -> quarantine
//      -> format/lint/typecheck -> generators -> tests -> schema pull -> evaluate
//
// Each phase records its own failures in the round report and the round moves
// on. Only setup (directories, lock, protection rules) may abort a run.

use super::{evaluate_stability, next_state, stop_reason, ControllerState, RunContext};
use crate::analysis::ReachabilityAnalyzer;
use crate::discovery::{relative_path, FileFinder};
use crate::error::FatalSetupError;
use crate::graph::GraphBuilder;
use crate::lock::LeaseLock;
use crate::quarantine::{Archiver, QuarantineManager, TarGzArchiver};
use crate::report::{FinalReport, ReportGenerator, RoundReport, StopReason, TerminalReporter, ToolDetail};
use crate::tools::{Outcome, ToolSuite};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ConvergenceController {
    ctx: RunContext,
    tools: ToolSuite,
    archiver: Box<dyn Archiver>,
    terminal: Option<TerminalReporter>,
    show_progress: bool,
}

impl ConvergenceController {
    pub fn new(ctx: RunContext) -> Self {
        let tools = ToolSuite::from_config(&ctx.root, &ctx.config);
        Self {
            ctx,
            tools,
            archiver: Box::new(TarGzArchiver),
            terminal: None,
            show_progress: false,
        }
    }

    pub fn with_tools(mut self, tools: ToolSuite) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_archiver(mut self, archiver: Box<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Print colored round summaries to stdout
    pub fn with_terminal(mut self, terminal: TerminalReporter) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Run rounds until convergence, the round cap or cancellation.
    ///
    /// Returns `Err` only for setup failures; a best-effort empty report is
    /// written before returning it.
    pub fn run(self) -> Result<FinalReport, FatalSetupError> {
        let mut reports = ReportGenerator::new(
            &self.ctx.run_id,
            &self.ctx.paths.run_report,
            &self.ctx.paths.final_report,
        );

        let mut setup = match self.setup() {
            Ok(setup) => setup,
            Err(err) => {
                warn!("Setup failed: {}", err);
                let _ = fs::create_dir_all(&self.ctx.paths.run_state_dir);
                if let Err(report_err) =
                    reports.finalize(StopReason::SetupFailed, None, Some(err.to_string()))
                {
                    debug!("Could not write setup failure report: {}", report_err);
                }
                return Err(err);
            }
        };

        let min_rounds = self.ctx.config.min_rounds_before_stop;
        let max_rounds = self.ctx.max_rounds();
        let mut stop = StopReason::MaxRounds;
        let mut state = ControllerState::Idle;

        info!(
            "Run {} on {} (rounds {}..={})",
            self.ctx.run_id,
            self.ctx.root.display(),
            min_rounds,
            max_rounds
        );

        let mut finished = None;
        while state != ControllerState::Done {
            state = match state {
                ControllerState::Idle => ControllerState::RunningRound(1),
                ControllerState::RunningRound(n) => {
                    let round = self.run_round(n, &mut setup);
                    if let Some(terminal) = &self.terminal {
                        terminal.round(&round);
                    }
                    reports.append(round);
                    setup.lock.heartbeat();
                    ControllerState::Evaluating(n)
                }
                ControllerState::Evaluating(n) => {
                    let stable = reports.rounds().last().is_some_and(|r| r.stability.stable);
                    if self.ctx.is_cancelled() {
                        info!("Cancellation requested; finalizing after round {}", n);
                        stop = StopReason::Cancelled;
                        ControllerState::Finalizing
                    } else {
                        let next = next_state(stable, n, min_rounds, max_rounds);
                        if next == ControllerState::Finalizing {
                            stop = if self.ctx.dry_run {
                                StopReason::DryRun
                            } else {
                                stop_reason(stable, n, min_rounds)
                            };
                        } else if self.ctx.config.round_delay_ms > 0 {
                            thread::sleep(Duration::from_millis(self.ctx.config.round_delay_ms));
                        }
                        next
                    }
                }
                ControllerState::Finalizing => {
                    finished = Some(self.finalize(&reports, &mut setup, stop));
                    setup.lock.release();
                    ControllerState::Done
                }
                ControllerState::Done => ControllerState::Done,
            };
        }

        let final_report = match finished {
            Some(result) => result?,
            None => reports.finalize(stop, None, None)?,
        };
        if let Some(terminal) = &self.terminal {
            terminal.final_summary(&final_report);
        }

        info!(
            "Run {} finished after {} round(s): {}",
            final_report.run_id,
            final_report.summary.total_rounds,
            final_report.summary.stop_reason.as_str()
        );
        Ok(final_report)
    }

    fn setup(&self) -> Result<RunSetup, FatalSetupError> {
        let paths = &self.ctx.paths;
        fs::create_dir_all(&paths.run_state_dir)
            .map_err(|e| FatalSetupError::directory(&paths.run_state_dir, e))?;

        let lock = LeaseLock::acquire(&paths.lock, &self.ctx.config.lock, &self.ctx.run_id)?;

        let analyzer = ReachabilityAnalyzer::from_config(&self.ctx.config)?;

        let quarantine = if self.ctx.dry_run {
            None
        } else {
            Some(QuarantineManager::new(
                &self.ctx.root,
                &self.ctx.config.quarantine_root,
                &self.ctx.run_id,
                &paths.index,
            )?)
        };

        Ok(RunSetup {
            lock,
            analyzer,
            quarantine,
        })
    }

    fn run_round(&self, n: u32, setup: &mut RunSetup) -> RoundReport {
        let ctx = &self.ctx;
        let mut round = RoundReport::new(n);
        info!("Round {} starting", n);

        // Scan
        let scan = FileFinder::new(&ctx.config).scan(&ctx.root);
        round.files_scanned = scan.files.len();
        for warning in &scan.warnings {
            round.record_phase_error("scan", warning.clone());
        }
        if self.interrupted(&mut round) {
            return round;
        }

        // Graph
        let builder = GraphBuilder::new(&ctx.root, &ctx.config);
        let mut build = builder.build(&scan.files);
        for warning in &build.warnings {
            round.record_phase_error("graph", warning.clone());
        }
        if !ctx.dry_run {
            match self.tools.graph_tool.edges(&ctx.root) {
                Outcome::Succeeded(edges) => {
                    round.external_edges_added = builder.augment(&mut build.graph, &edges);
                }
                Outcome::Skipped { reason } => debug!("Graph tool skipped: {}", reason),
                Outcome::Failed { error } => round.record_phase_error("graph-tool", error),
            }
        }
        round.graph_node_count = build.graph.node_count();
        round.graph_edge_count = build.graph.edge_count();
        round.unresolved_count = build.graph.unresolved().count();
        if let Err(err) = build.graph.snapshot(n).write(&ctx.paths.snapshot(n)) {
            round.record_phase_error("snapshot", err.to_string());
        }
        setup.lock.heartbeat();
        if self.interrupted(&mut round) {
            return round;
        }

        // Analyze
        let partition = setup.analyzer.analyze(&scan.files, &build.graph, n);
        round.candidate_count = partition.candidates.len();
        round.candidates = partition.candidates;

        let Some(quarantine) = setup.quarantine.as_mut() else {
            round.stability = evaluate_stability(&round);
            return round;
        };

        // Quarantine: one move at a time through the manager
        if !round.candidates.is_empty() {
            let progress = self.progress_bar(round.candidates.len() as u64);
            let bytes_before = quarantine.bytes_quarantined();
            for candidate in &round.candidates {
                progress.set_message(candidate.path.clone());
                let entry = quarantine.quarantine(candidate, n);
                if entry.manual_review {
                    round.manual_review.push(entry.original_path.clone());
                }
                round.entries.push(entry);
                progress.inc(1);
            }
            progress.finish_and_clear();
            round.moved_count = round.entries.iter().filter(|e| e.succeeded()).count();
            round.bytes_quarantined = quarantine.bytes_quarantined() - bytes_before;
        }
        setup.lock.heartbeat();
        if self.interrupted(&mut round) {
            return round;
        }

        // Quality tools. Each one may run up to the tool timeout, so the
        // lease is refreshed after every call.
        let format = self.tools.formatter.fix(&ctx.root);
        round.tool_results.format = format.status();
        round.tool_details.push(ToolDetail::from_outcome("format", &format));
        setup.lock.heartbeat();

        let lint = self.tools.linter.fix(&ctx.root);
        round.tool_results.lint = lint.status();
        round.tool_details.push(ToolDetail::from_outcome("lint", &lint));
        setup.lock.heartbeat();

        let typecheck = self.tools.typecheck.check(&ctx.root);
        round.tool_results.typecheck = typecheck.status();
        round.tool_details.push(ToolDetail::from_outcome("typecheck", &typecheck));
        setup.lock.heartbeat();
        if self.interrupted(&mut round) {
            return round;
        }

        // Generators
        let lock = &mut setup.lock;
        for result in self.tools.generators.run_each(|| {
            lock.heartbeat();
        }) {
            if result.outcome.is_failed() {
                round.record_phase_error(
                    &format!("generator:{}", result.name),
                    result.outcome.detail().unwrap_or_default().to_string(),
                );
            }
            round
                .generators
                .push(ToolDetail::from_outcome(&result.name, &result.outcome));
        }
        if self.interrupted(&mut round) {
            return round;
        }

        // Tests
        let tests = self.tools.test_runner.run(&ctx.config.test_dir);
        round.tool_results.test = tests.status();
        round.test_counts = tests.value().copied();
        round.tool_details.push(ToolDetail::from_status("test", &tests));
        setup.lock.heartbeat();
        if self.interrupted(&mut round) {
            return round;
        }

        // Schema pull
        let schema = self.tools.schema_puller.pull();
        round.tool_results.schema_pull = schema.status();
        round.tool_details.push(ToolDetail {
            run: schema.value().map(|pull| pull.run.clone()),
            ..ToolDetail::from_status("schemaPull", &schema)
        });

        round.stability = evaluate_stability(&round);
        info!(
            "Round {} {}",
            n,
            if round.stability.stable {
                "stable".to_string()
            } else {
                format!("unstable: {}", round.stability.reasons.join("; "))
            }
        );
        round
    }

    /// Stop the round between phases once cancellation was requested
    fn interrupted(&self, round: &mut RoundReport) -> bool {
        if !self.ctx.is_cancelled() {
            return false;
        }
        let mut verdict = evaluate_stability(round);
        verdict.stable = false;
        verdict
            .reasons
            .push("round interrupted by cancellation".to_string());
        round.stability = verdict;
        true
    }

    fn finalize(
        &self,
        reports: &ReportGenerator,
        setup: &mut RunSetup,
        stop: StopReason,
    ) -> Result<FinalReport, FatalSetupError> {
        let moved = setup
            .quarantine
            .as_ref()
            .map(|q| q.index().len())
            .unwrap_or(0);

        let bundle = if moved > 0 {
            let outcome: Outcome<u64> = self
                .archiver
                .archive(&self.ctx.paths.quarantine_root, &self.ctx.paths.bundle)
                .into();
            match outcome {
                Outcome::Succeeded(files) => {
                    info!(
                        "Rollback bundle ({}) with {} files at {}",
                        self.archiver.name(),
                        files,
                        self.ctx.paths.bundle.display()
                    );
                    relative_path(&self.ctx.root, &self.ctx.paths.bundle)
                }
                other => {
                    warn!(
                        "Rollback bundle not created: {}",
                        other.detail().unwrap_or("unknown error")
                    );
                    None
                }
            }
        } else {
            // Nothing was moved; do not leave an empty run directory behind
            let _ = fs::remove_dir(&self.ctx.paths.quarantine_run_dir);
            None
        };

        reports.finalize(stop, bundle, None)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

/// Resources held for the lifetime of a run
struct RunSetup {
    lock: LeaseLock,
    analyzer: ReachabilityAnalyzer,
    quarantine: Option<QuarantineManager>,
}
