use crate::config::Config;
use crate::error::FatalSetupError;
use crate::graph::GraphSnapshot;
use crate::lock::LOCK_FILE_NAME;
use crate::quarantine::INDEX_FILE_NAME;
use crate::report::{FINAL_REPORT_FILE_NAME, RUN_REPORT_FILE_NAME};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// ISO-8601 style run id that is also a valid directory name
pub fn new_run_id() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// Set once an interrupt or terminate signal arrives
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT/SIGTERM into this flag. Can only be installed once per
    /// process.
    pub fn install_handler(&self) -> Result<(), FatalSetupError> {
        let flag = self.0.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FatalSetupError::Signal(e.to_string()))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Every on-disk location a run touches
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub quarantine_root: PathBuf,
    pub quarantine_run_dir: PathBuf,
    pub state_dir: PathBuf,
    pub run_state_dir: PathBuf,
    pub index: PathBuf,
    pub run_report: PathBuf,
    pub final_report: PathBuf,
    pub lock: PathBuf,
    pub bundle: PathBuf,
}

impl RunPaths {
    pub fn new(root: &Path, config: &Config, run_id: &str) -> Self {
        let quarantine_root = root.join(&config.quarantine_root);
        let state_dir = root.join(&config.state_dir);
        let run_state_dir = Self::runs_dir(&state_dir).join(run_id);
        Self {
            quarantine_run_dir: quarantine_root.join(run_id),
            quarantine_root,
            index: run_state_dir.join(INDEX_FILE_NAME),
            run_report: run_state_dir.join(RUN_REPORT_FILE_NAME),
            final_report: state_dir.join(FINAL_REPORT_FILE_NAME),
            lock: state_dir.join(LOCK_FILE_NAME),
            bundle: state_dir
                .join("bundles")
                .join(format!("rollback_bundle_{}.tar.gz", run_id)),
            run_state_dir,
            state_dir,
        }
    }

    /// Directory holding one subdirectory per recorded run
    pub fn runs_dir(state_dir: &Path) -> PathBuf {
        state_dir.join("runs")
    }

    pub fn snapshot(&self, round: u32) -> PathBuf {
        self.run_state_dir.join(GraphSnapshot::file_name(round))
    }
}

/// Everything one run needs, passed explicitly through each phase
#[derive(Debug, Clone)]
pub struct RunContext {
    pub root: PathBuf,
    pub config: Config,
    pub run_id: String,
    pub paths: RunPaths,
    pub cancel: CancelFlag,
    /// Analyze only; nothing is moved and no tool runs
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(root: &Path, config: Config) -> Self {
        let run_id = new_run_id();
        Self::with_run_id(root, config, &run_id)
    }

    pub fn with_run_id(root: &Path, config: Config, run_id: &str) -> Self {
        let config = config.normalized();
        Self {
            root: root.to_path_buf(),
            paths: RunPaths::new(root, &config, run_id),
            config,
            run_id: run_id.to_string(),
            cancel: CancelFlag::new(),
            dry_run: false,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Rounds this run may execute
    pub fn max_rounds(&self) -> u32 {
        if self.dry_run {
            1
        } else {
            self.config.max_rounds
        }
    }
}
