//! External tool adapters
//!
//! Every adapter is optional. A tool that is disabled, not applicable to the
//! repository or not installed yields [`Outcome::Skipped`]; a tool that runs
//! and reports problems (or times out) yields [`Outcome::Failed`]. Nothing
//! here returns an error past the adapter boundary.

mod adapters;
mod graph_tool;
mod process;

pub use adapters::{
    CommandAdapter, CommandSchemaPuller, CommandTestRunner, Formatter, GeneratorResult,
    GeneratorRunner, Linter, SchemaPull, SchemaPuller, TestCounts, TestRunner, TypeChecker,
};
pub use graph_tool::{GraphTool, MadgeGraphTool};
pub use process::{locate_program, run_with_timeout, tail_chars, CommandOutput, ToolInvoker};

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Three-way result of a phase or tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Succeeded(T),
    /// Not installed, not configured, or not applicable
    Skipped { reason: String },
    /// Ran and reported errors, crashed or timed out
    Failed { error: String },
}

impl<T> Outcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Outcome::Failed {
            error: error.into(),
        }
    }

    pub fn status(&self) -> ToolStatus {
        match self {
            Outcome::Succeeded(_) => ToolStatus::Succeeded,
            Outcome::Skipped { .. } => ToolStatus::Skipped,
            Outcome::Failed { .. } => ToolStatus::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Succeeded(v) => Outcome::Succeeded(f(v)),
            Outcome::Skipped { reason } => Outcome::Skipped { reason },
            Outcome::Failed { error } => Outcome::Failed { error },
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Succeeded(v) => f(v),
            Outcome::Skipped { reason } => Outcome::Skipped { reason },
            Outcome::Failed { error } => Outcome::Failed { error },
        }
    }

    /// Skip reason or error message, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::Skipped { reason } => Some(reason),
            Outcome::Failed { error } => Some(error),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Outcome::Succeeded(v),
            Err(e) => Outcome::failed(e.to_string()),
        }
    }
}

/// Status string as it appears in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Succeeded,
    Skipped,
    Failed,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Succeeded => "succeeded",
            ToolStatus::Skipped => "skipped",
            ToolStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful command run leaves behind for the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRun {
    pub program: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub output_tail: String,
}

/// The full set of collaborators one run talks to
pub struct ToolSuite {
    pub formatter: Box<dyn Formatter>,
    pub linter: Box<dyn Linter>,
    pub typecheck: Box<dyn TypeChecker>,
    pub test_runner: Box<dyn TestRunner>,
    pub schema_puller: Box<dyn SchemaPuller>,
    pub graph_tool: Box<dyn GraphTool>,
    pub generators: GeneratorRunner,
}

impl ToolSuite {
    /// Command-backed adapters as configured
    pub fn from_config(root: &Path, config: &Config) -> Self {
        let invoker = ToolInvoker::new(root, &config.tools);
        let tools = &config.tools;
        let test_dir = config.test_dir.to_string_lossy().into_owned();

        Self {
            formatter: Box::new(CommandAdapter::new("format", tools.formatter.clone(), invoker.clone())),
            linter: Box::new(CommandAdapter::new("lint", tools.linter.clone(), invoker.clone())),
            typecheck: Box::new(CommandAdapter::new(
                "typecheck",
                tools.typecheck.clone(),
                invoker.clone(),
            )),
            test_runner: Box::new(CommandTestRunner::new(
                tools.test_runner.clone(),
                invoker.clone(),
                &test_dir,
            )),
            schema_puller: Box::new(CommandSchemaPuller::new(
                tools.schema_puller.clone(),
                invoker.clone(),
                config.schema_credentials_present(),
            )),
            graph_tool: Box::new(MadgeGraphTool::new(tools.graph_tool.clone(), invoker.clone())),
            generators: GeneratorRunner::new(config.generators.clone(), invoker),
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_linter(mut self, linter: Box<dyn Linter>) -> Self {
        self.linter = linter;
        self
    }

    pub fn with_test_runner(mut self, test_runner: Box<dyn TestRunner>) -> Self {
        self.test_runner = test_runner;
        self
    }

    pub fn with_graph_tool(mut self, graph_tool: Box<dyn GraphTool>) -> Self {
        self.graph_tool = graph_tool;
        self
    }
}
