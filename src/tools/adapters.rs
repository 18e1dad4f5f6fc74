use super::{CommandOutput, Outcome, ToolInvoker, ToolRun};
use crate::config::{GeneratorConfig, ToolCommand};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Rewrites formatting in place
pub trait Formatter: Send + Sync {
    fn fix(&self, root: &Path) -> Outcome<ToolRun>;
}

/// Applies automatic lint fixes
pub trait Linter: Send + Sync {
    fn fix(&self, root: &Path) -> Outcome<ToolRun>;
}

/// Verifies types without emitting output
pub trait TypeChecker: Send + Sync {
    fn check(&self, root: &Path) -> Outcome<ToolRun>;
}

/// Runs the test suite in `test_dir`
pub trait TestRunner: Send + Sync {
    fn run(&self, test_dir: &Path) -> Outcome<TestCounts>;
}

/// Refreshes the database schema snapshot
pub trait SchemaPuller: Send + Sync {
    fn pull(&self) -> Outcome<SchemaPull>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPull {
    pub success: bool,
    #[serde(flatten)]
    pub run: ToolRun,
}

/// A configured command where a zero exit code means success
pub struct CommandAdapter {
    label: &'static str,
    command: ToolCommand,
    invoker: ToolInvoker,
}

impl CommandAdapter {
    pub fn new(label: &'static str, command: ToolCommand, invoker: ToolInvoker) -> Self {
        Self {
            label,
            command,
            invoker,
        }
    }

    fn execute(&self) -> Outcome<ToolRun> {
        let outcome = self.invoker.invoke(&self.command, &[]).and_then(exit_code_outcome);
        debug!("{}: {}", self.label, outcome.status());
        outcome
    }
}

fn exit_code_outcome(output: CommandOutput) -> Outcome<ToolRun> {
    if output.success {
        Outcome::Succeeded(output.to_run())
    } else {
        Outcome::failed(output.non_zero_exit().to_string())
    }
}

impl Formatter for CommandAdapter {
    fn fix(&self, _root: &Path) -> Outcome<ToolRun> {
        self.execute()
    }
}

impl Linter for CommandAdapter {
    fn fix(&self, _root: &Path) -> Outcome<ToolRun> {
        self.execute()
    }
}

impl TypeChecker for CommandAdapter {
    fn check(&self, _root: &Path) -> Outcome<ToolRun> {
        self.execute()
    }
}

/// Test runner whose pass/fail counts are read from its summary lines
pub struct CommandTestRunner {
    command: ToolCommand,
    invoker: ToolInvoker,
    test_dir: String,
    passed: Regex,
    failed: Regex,
}

impl CommandTestRunner {
    pub fn new(command: ToolCommand, invoker: ToolInvoker, test_dir: &str) -> Self {
        Self {
            command,
            invoker,
            test_dir: test_dir.to_string(),
            passed: Regex::new(r"(?i)\b(\d+)\s+(?:tests?\s+)?passed\b").expect("valid regex"),
            failed: Regex::new(r"(?i)\b(\d+)\s+(?:tests?\s+)?failed\b").expect("valid regex"),
        }
    }

    /// Extract counts from runner output. A non-zero exit without a parsable
    /// failure count is treated as one failure.
    pub fn parse_counts(&self, output: &CommandOutput) -> TestCounts {
        let text = format!("{}\n{}", output.stdout, output.stderr);
        let count = |re: &Regex| -> u32 {
            re.captures_iter(&text)
                .filter_map(|c| c[1].parse::<u32>().ok())
                .max()
                .unwrap_or(0)
        };

        let mut counts = TestCounts {
            passed: count(&self.passed),
            failed: count(&self.failed),
        };
        if !output.success && counts.failed == 0 {
            counts.failed = 1;
        }
        counts
    }
}

impl TestRunner for CommandTestRunner {
    fn run(&self, test_dir: &Path) -> Outcome<TestCounts> {
        let dir = self.invoker.root().join(test_dir);
        if !dir.exists() {
            return Outcome::skipped(format!("test directory {} does not exist", test_dir.display()));
        }
        let rel = test_dir.to_string_lossy().into_owned();
        let rel = if rel.is_empty() { self.test_dir.clone() } else { rel };

        self.invoker
            .invoke(&self.command, &[("test_dir", rel.as_str())])
            .map(|output| self.parse_counts(&output))
    }
}

/// Schema snapshot command gated on credential presence
pub struct CommandSchemaPuller {
    command: ToolCommand,
    invoker: ToolInvoker,
    credentials_present: bool,
}

impl CommandSchemaPuller {
    pub fn new(command: ToolCommand, invoker: ToolInvoker, credentials_present: bool) -> Self {
        Self {
            command,
            invoker,
            credentials_present,
        }
    }
}

impl SchemaPuller for CommandSchemaPuller {
    fn pull(&self) -> Outcome<SchemaPull> {
        if !self.credentials_present {
            return Outcome::skipped("schema credentials not present");
        }
        self.invoker
            .invoke(&self.command, &[])
            .and_then(|output| {
                if output.success {
                    Outcome::Succeeded(SchemaPull {
                        success: true,
                        run: output.to_run(),
                    })
                } else {
                    Outcome::failed(output.non_zero_exit().to_string())
                }
            })
    }
}

/// One generator's result for a round
#[derive(Debug, Clone)]
pub struct GeneratorResult {
    pub name: String,
    pub outcome: Outcome<ToolRun>,
}

/// Runs the configured opaque generators in declaration order
pub struct GeneratorRunner {
    generators: Vec<GeneratorConfig>,
    invoker: ToolInvoker,
}

impl GeneratorRunner {
    pub fn new(generators: Vec<GeneratorConfig>, invoker: ToolInvoker) -> Self {
        Self {
            generators,
            invoker,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn run_all(&self) -> Vec<GeneratorResult> {
        self.run_each(|| {})
    }

    /// Like `run_all`, calling `after_each` once each generator has finished
    pub fn run_each(&self, mut after_each: impl FnMut()) -> Vec<GeneratorResult> {
        self.generators
            .iter()
            .map(|generator| {
                let outcome = self
                    .invoker
                    .invoke(&generator.command, &[])
                    .and_then(exit_code_outcome);
                info!("Generator {}: {}", generator.name, outcome.status());
                after_each();
                GeneratorResult {
                    name: generator.name.clone(),
                    outcome,
                }
            })
            .collect()
    }
}
