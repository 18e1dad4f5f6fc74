use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use miette::{miette, Result};
use repohygiene::artifact::read_json;
use repohygiene::config::ToolsConfig;
use repohygiene::convergence::{CancelFlag, ConvergenceController, RunContext, RunPaths};
use repohygiene::lock::{LeaseLock, LOCK_FILE_NAME};
use repohygiene::quarantine::{replay, RestoreIndex, INDEX_FILE_NAME};
use repohygiene::report::{FinalReport, TerminalReporter, RUN_REPORT_FILE_NAME};
use repohygiene::Config;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// Repohygiene - converge a JavaScript/TypeScript repository by quarantining
/// unreferenced files and re-running its quality tools
#[derive(Parser, Debug)]
#[command(name = "repohygiene")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository root to operate on
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of rounds
    #[arg(long, value_name = "N")]
    max_rounds: Option<u32>,

    /// Rounds that must run before a stable round ends the run
    #[arg(long, value_name = "N")]
    min_rounds: Option<u32>,

    /// Extra roots that are scanned but never quarantined (can be specified multiple times)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Extra glob patterns that are never quarantined (can be specified multiple times)
    #[arg(short, long)]
    protect: Vec<String>,

    /// Analyze once and report candidates without moving anything
    #[arg(long)]
    dry_run: bool,

    /// Do not run formatter, linter, typecheck, tests, schema pull, graph tool or generators
    #[arg(long)]
    no_tools: bool,

    /// Copy every file quarantined by RUN_ID back to its original location
    #[arg(long, value_name = "RUN_ID", conflicts_with_all = ["dry_run", "list_runs"])]
    restore: Option<String>,

    /// List recorded runs
    #[arg(long)]
    list_runs: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only errors and the final report file
    #[arg(short, long)]
    quiet: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose, cli.quiet);

    info!("repohygiene v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    if cli.list_runs {
        return list_runs(&config, &cli);
    }
    if let Some(run_id) = &cli.restore {
        return restore_run(&config, &cli, run_id);
    }

    run(config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(&cli.path)?
    };

    // Override with CLI arguments
    if let Some(max) = cli.max_rounds {
        config.max_rounds = max;
    }
    if let Some(min) = cli.min_rounds {
        config.min_rounds_before_stop = min;
    }
    if !cli.exclude.is_empty() {
        config.excluded_roots.extend(cli.exclude.clone());
    }
    if !cli.protect.is_empty() {
        config.protected.extend(cli.protect.clone());
    }
    if cli.no_tools {
        config.tools = ToolsConfig {
            timeout_secs: config.tools.timeout_secs,
            kill_grace_ms: config.tools.kill_grace_ms,
            ..ToolsConfig::all_disabled()
        };
        config.generators.clear();
    }

    Ok(config.normalized())
}

fn run(config: Config, cli: &Cli) -> Result<()> {
    let cancel = CancelFlag::new();
    cancel.install_handler()?;

    let ctx = RunContext::new(&cli.path, config)
        .with_cancel(cancel)
        .with_dry_run(cli.dry_run);
    let report_path = ctx.paths.run_report.clone();

    let mut controller =
        ConvergenceController::new(ctx).with_progress(!cli.quiet && std::io::stdout().is_terminal());
    if !cli.quiet {
        controller = controller.with_terminal(TerminalReporter::new());
    }

    // Setup failures are the only path to a non-zero exit
    let report = controller.run()?;

    if cli.quiet {
        println!("{}", report_path.display());
    } else {
        println!(
            "{} {}",
            "📄 Report:".cyan(),
            report_path.display().to_string().dimmed()
        );
    }
    Ok(())
}

fn restore_run(config: &Config, cli: &Cli, run_id: &str) -> Result<()> {
    let state_dir = cli.path.join(&config.state_dir);
    let index_path = RunPaths::runs_dir(&state_dir).join(run_id).join(INDEX_FILE_NAME);
    let index = RestoreIndex::load(&index_path)
        .map_err(|e| miette!("cannot restore run {}: {}", run_id, e))?;

    let _lock = LeaseLock::acquire(&state_dir.join(LOCK_FILE_NAME), &config.lock, run_id)
        .map_err(repohygiene::error::FatalSetupError::from)?;

    info!("Restoring {} file(s) from run {}", index.len(), run_id);
    let report = replay(&cli.path, &index);
    if !cli.quiet {
        TerminalReporter::new().restore(&report);
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(miette!(
            "{} of {} file(s) could not be restored",
            report.failed.len(),
            index.len()
        ))
    }
}

fn list_runs(config: &Config, cli: &Cli) -> Result<()> {
    let runs_dir = RunPaths::runs_dir(&cli.path.join(&config.state_dir));
    let mut runs: Vec<String> = match std::fs::read_dir(&runs_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    runs.sort();

    if runs.is_empty() {
        println!("{}", "No recorded runs.".yellow());
        return Ok(());
    }

    for run_id in runs {
        let dir = runs_dir.join(&run_id);
        let indexed = RestoreIndex::load(&dir.join(INDEX_FILE_NAME))
            .map(|i| i.len())
            .unwrap_or(0);
        match read_json::<FinalReport>(&dir.join(RUN_REPORT_FILE_NAME)) {
            Ok(report) => println!(
                "{}  {} round(s), {} moved, {} restorable, {}",
                run_id.cyan(),
                report.summary.total_rounds,
                report.summary.total_moved,
                indexed,
                report.summary.stop_reason.as_str()
            ),
            Err(_) => println!("{}  {} restorable, no report", run_id.cyan(), indexed),
        }
    }
    Ok(())
}
