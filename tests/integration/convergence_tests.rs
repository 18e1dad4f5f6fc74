//! Integration tests for the convergence loop
//!
//! Each test builds a scratch repository, runs the controller with external
//! tools disabled (or stubbed) and inspects the final report and the tree.

use repohygiene::artifact::read_json;
use repohygiene::config::{Config, LockConfig, ToolsConfig};
use repohygiene::convergence::{CancelFlag, ConvergenceController, RunContext};
use repohygiene::error::FatalSetupError;
use repohygiene::lock::LeaseLock;
use repohygiene::quarantine::{replay, RestoreIndex};
use repohygiene::report::{FinalReport, StopReason};
use repohygiene::tools::{GraphTool, Outcome, TestCounts, TestRunner, ToolSuite, ToolStatus};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const RUN_ID: &str = "2026-03-04T05-06-07-089Z";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn quiet_config() -> Config {
    Config {
        tools: ToolsConfig::all_disabled(),
        lock: LockConfig {
            wait_secs: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn context(root: &Path, config: Config) -> RunContext {
    RunContext::with_run_id(root, config, RUN_ID)
}

fn run(root: &Path, config: Config) -> FinalReport {
    ConvergenceController::new(context(root, config))
        .run()
        .expect("run should not fail setup")
}

/// `page` imports `b`; `c` is orphaned
fn scenario_a(root: &Path) {
    write(root, "src/app/page.tsx", "import { b } from '../lib/b';\n");
    write(root, "src/lib/b.ts", "export const b = 1;\n");
    write(root, "src/lib/c.ts", "export const c = 2;\n");
}

struct FailingTests;

impl TestRunner for FailingTests {
    fn run(&self, _test_dir: &Path) -> Outcome<TestCounts> {
        Outcome::Succeeded(TestCounts {
            passed: 3,
            failed: 1,
        })
    }
}

/// Records, per round, whether `suite` still exists when the runner starts
struct SuiteWitness {
    suite: PathBuf,
    seen: Arc<Mutex<Vec<bool>>>,
}

impl TestRunner for SuiteWitness {
    fn run(&self, _test_dir: &Path) -> Outcome<TestCounts> {
        let present = self.suite.is_file();
        self.seen.lock().unwrap().push(present);
        Outcome::Succeeded(TestCounts {
            passed: u32::from(present),
            failed: 0,
        })
    }
}

struct FixedEdges(Vec<(String, String)>);

impl GraphTool for FixedEdges {
    fn name(&self) -> &str {
        "fixed"
    }

    fn edges(&self, _root: &Path) -> Outcome<Vec<(String, String)>> {
        Outcome::Succeeded(self.0.clone())
    }
}

// ============================================================================
// Convergence
// ============================================================================

mod convergence_tests {
    use super::*;

    #[test]
    fn test_orphan_is_quarantined_then_run_converges() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let report = run(root, quiet_config());

        assert_eq!(report.rounds[0].candidate_count, 1);
        assert_eq!(report.rounds[0].moved_count, 1);
        assert_eq!(report.rounds[0].candidates[0].path, "src/lib/c.ts");
        assert!(!report.rounds[0].stability.stable);

        assert!(!root.join("src/lib/c.ts").exists());
        assert!(root.join("src/lib/b.ts").exists());
        assert!(root
            .join(".isolated_trash")
            .join(RUN_ID)
            .join("src/lib/c.ts")
            .exists());

        // Stable from round 2, but three rounds must run first
        assert_eq!(report.rounds.len(), 3);
        assert!(report.rounds[1..].iter().all(|r| r.stability.stable));
        assert_eq!(report.summary.stop_reason, StopReason::Converged);
        assert_eq!(report.summary.total_moved, 1);
        assert!(report.summary.final_stable);
    }

    #[test]
    fn test_skipped_tools_do_not_block_stability() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app/page.tsx", "export default function Page() {}\n");

        let config = Config {
            min_rounds_before_stop: 1,
            ..quiet_config()
        };
        let report = run(root, config);

        let round = &report.rounds[0];
        assert_eq!(round.tool_results.lint, ToolStatus::Skipped);
        assert_eq!(round.tool_results.test, ToolStatus::Skipped);
        assert!(round.stability.stable, "{:?}", round.stability.reasons);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.summary.stop_reason, StopReason::Converged);
    }

    #[test]
    fn test_mutual_pair_survives_every_round() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/x.ts", "import './y';\n");
        write(root, "src/y.ts", "import './x';\n");

        let report = run(root, quiet_config());

        assert!(report.rounds.iter().all(|r| r.candidate_count == 0));
        assert!(root.join("src/x.ts").exists());
        assert!(root.join("src/y.ts").exists());
        assert_eq!(report.summary.total_moved, 0);
    }

    #[test]
    fn test_cascade_takes_one_round_per_layer() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app/page.tsx", "");
        write(root, "src/top.ts", "import './middle';\n");
        write(root, "src/middle.ts", "export {};\n");

        let config = Config {
            min_rounds_before_stop: 1,
            ..quiet_config()
        };
        let report = run(root, config);

        assert_eq!(report.rounds[0].candidates[0].path, "src/top.ts");
        assert_eq!(report.rounds[1].candidates[0].path, "src/middle.ts");
        assert_eq!(report.rounds.len(), 3);
        assert_eq!(report.summary.total_moved, 2);
    }

    #[test]
    fn test_test_suite_is_never_quarantined() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app/page.tsx", "");
        write(
            root,
            "tests/auto_generated/smoke.spec.ts",
            "import { test } from '@playwright/test';\n",
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = context(root, quiet_config());
        let tools = ToolSuite::from_config(&ctx.root, &ctx.config).with_test_runner(Box::new(
            SuiteWitness {
                suite: root.join("tests/auto_generated/smoke.spec.ts"),
                seen: Arc::clone(&seen),
            },
        ));
        let report = ConvergenceController::new(ctx).with_tools(tools).run().unwrap();

        assert!(report.rounds.iter().all(|r| r.candidate_count == 0));
        assert_eq!(*seen.lock().unwrap(), vec![true, true, true]);
        assert!(root.join("tests/auto_generated/smoke.spec.ts").exists());
        assert_eq!(report.rounds[0].test_counts.map(|c| c.passed), Some(1));
    }

    #[test]
    fn test_external_graph_edges_keep_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app/page.tsx", "");
        write(root, "src/lib/dynamic.ts", "");

        let config = Config {
            min_rounds_before_stop: 1,
            ..quiet_config()
        };
        let ctx = context(root, config);
        let tools = ToolSuite::from_config(&ctx.root, &ctx.config).with_graph_tool(Box::new(
            FixedEdges(vec![(
                "src/app/page.tsx".to_string(),
                "src/lib/dynamic.ts".to_string(),
            )]),
        ));
        let report = ConvergenceController::new(ctx).with_tools(tools).run().unwrap();

        assert_eq!(report.rounds[0].external_edges_added, 1);
        assert_eq!(report.rounds[0].candidate_count, 0);
        assert!(root.join("src/lib/dynamic.ts").exists());
    }
}

// ============================================================================
// Stopping
// ============================================================================

mod stopping_tests {
    use super::*;

    #[test]
    fn test_failing_tests_run_exactly_max_rounds() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/app/page.tsx", "");

        let config = Config {
            max_rounds: 4,
            ..quiet_config()
        };
        let ctx = context(root, config);
        let tools =
            ToolSuite::from_config(&ctx.root, &ctx.config).with_test_runner(Box::new(FailingTests));
        let report = ConvergenceController::new(ctx).with_tools(tools).run().unwrap();

        assert_eq!(report.rounds.len(), 4);
        assert_eq!(report.summary.stop_reason, StopReason::MaxRounds);
        assert!(!report.summary.final_stable);
        assert!(report.rounds[3]
            .stability
            .reasons
            .contains(&"1 test(s) failed".to_string()));
    }

    #[test]
    fn test_no_round_after_first_stable_once_min_reached() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let config = Config {
            min_rounds_before_stop: 1,
            ..quiet_config()
        };
        let report = run(root, config);

        assert_eq!(report.rounds.len(), 2);
        assert!(report.rounds[1].stability.stable);
        assert_eq!(report.summary.stop_reason, StopReason::Converged);
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let ctx = context(root, quiet_config()).with_dry_run(true);
        let report = ConvergenceController::new(ctx).run().unwrap();

        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].candidate_count, 1);
        assert_eq!(report.rounds[0].moved_count, 0);
        assert_eq!(report.summary.stop_reason, StopReason::DryRun);
        assert!(root.join("src/lib/c.ts").exists());
        assert!(!root.join(".isolated_trash").exists());
    }

    #[test]
    fn test_cancelled_run_finalizes_after_one_round() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let ctx = context(root, quiet_config()).with_cancel(cancel);
        let report = ConvergenceController::new(ctx).run().unwrap();

        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.summary.stop_reason, StopReason::Cancelled);
        assert!(report.rounds[0]
            .stability
            .reasons
            .contains(&"round interrupted by cancellation".to_string()));
        assert!(root.join("src/lib/c.ts").exists());
        assert!(!root.join(".repohygiene/orchestrator.lock").exists());
    }

    #[test]
    fn test_held_lock_fails_setup() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let config = quiet_config();
        let _held = LeaseLock::acquire(
            &root.join(".repohygiene/orchestrator.lock"),
            &config.lock,
            "other-run",
        )
        .unwrap();

        let err = ConvergenceController::new(context(root, config))
            .run()
            .unwrap_err();
        assert!(matches!(err, FatalSetupError::Lock(_)));
        assert!(root.join("src/lib/c.ts").exists());

        let report: FinalReport = read_json(&root.join(".repohygiene/final_report.json")).unwrap();
        assert_eq!(report.summary.stop_reason, StopReason::SetupFailed);
        assert!(report.rounds.is_empty());
    }
}

// ============================================================================
// Artifacts
// ============================================================================

mod artifact_tests {
    use super::*;

    #[test]
    fn test_reports_snapshots_and_bundle_are_written() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);

        let report = run(root, quiet_config());
        let run_dir = root.join(".repohygiene/runs").join(RUN_ID);

        let on_disk: FinalReport = read_json(&run_dir.join("report.json")).unwrap();
        assert_eq!(on_disk.rounds.len(), report.rounds.len());
        assert_eq!(on_disk.summary.stop_reason, StopReason::Converged);
        assert!(root.join(".repohygiene/final_report.json").exists());

        for n in 1..=3 {
            assert!(run_dir.join(format!("graph-round-{:02}.json", n)).exists());
        }

        let bundle = report.summary.rollback_bundle.expect("bundle recorded");
        assert!(root.join(bundle).exists());
        assert!(!root.join(".repohygiene/orchestrator.lock").exists());
    }

    #[test]
    fn test_restore_index_brings_back_quarantined_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        scenario_a(root);
        let original = fs::read(root.join("src/lib/c.ts")).unwrap();

        run(root, quiet_config());
        assert!(!root.join("src/lib/c.ts").exists());

        let index_path = root
            .join(".repohygiene/runs")
            .join(RUN_ID)
            .join("restore-index.json");
        let index = RestoreIndex::load(&index_path).unwrap();
        let restored = replay(root, &index);

        assert!(restored.is_complete());
        assert_eq!(fs::read(root.join("src/lib/c.ts")).unwrap(), original);
    }
}
