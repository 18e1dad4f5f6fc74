//! Configuration loading
//!
//! Looks for `.repohygiene.yml`, `.repohygiene.yaml` or `.repohygiene.toml`
//! in the repository root. Every key is optional; CLI flags override file
//! values afterwards.

use crate::error::FatalSetupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File names searched by [`Config::from_default_locations`], in order
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
    [".repohygiene.yml", ".repohygiene.yaml", ".repohygiene.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hard cap on rounds per run
    pub max_rounds: u32,

    /// A stable round only ends the run once this many rounds have executed
    pub min_rounds_before_stop: u32,

    /// Where quarantined files are mirrored, relative to the root
    pub quarantine_root: PathBuf,

    /// Snapshots, restore indexes, reports, lock and bundles
    pub state_dir: PathBuf,

    /// Directory or file names that are never scanned
    pub ignore: Vec<String>,

    /// Honour .gitignore files while walking
    pub respect_gitignore: bool,

    /// Glob patterns for files that are never candidates
    pub protected: Vec<String>,

    /// Roots that are graphed but never candidates
    pub excluded_roots: Vec<String>,

    /// Case-insensitive filename fragments marking likely-removable files
    pub junk_patterns: Vec<String>,

    /// Specifier prefix rewrites, e.g. `@/` -> `src/`
    pub aliases: BTreeMap<String, String>,

    /// Extensions whose contents are scanned for specifiers
    pub source_extensions: Vec<String>,

    /// Probing order for extensionless specifiers
    pub resolve_extensions: Vec<String>,

    pub tools: ToolsConfig,

    /// Directory handed to the test runner
    pub test_dir: PathBuf,

    /// Opaque commands run each round between quarantine and tests
    pub generators: Vec<GeneratorConfig>,

    /// Environment variables that must all be set for the schema puller
    pub schema_env: Vec<String>,

    pub lock: LockConfig,

    /// Pause between rounds
    pub round_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            min_rounds_before_stop: 3,
            quarantine_root: PathBuf::from(".isolated_trash"),
            state_dir: PathBuf::from(".repohygiene"),
            ignore: strings(&[
                ".git",
                ".hg",
                ".svn",
                "node_modules",
                ".next",
                "target",
                "dist",
                "build",
                "coverage",
                ".turbo",
                ".cache",
            ]),
            respect_gitignore: true,
            protected: default_protected(),
            excluded_roots: strings(&["migrations", "supabase"]),
            junk_patterns: strings(&[
                "mock", "test", "spec", "example", "backup", ".bak", ".old", "temp", "fixture",
            ]),
            aliases: BTreeMap::new(),
            source_extensions: strings(&[
                "ts", "tsx", "js", "jsx", "mjs", "cjs", "css", "scss", "sass", "less", "html", "vue",
                "svelte",
            ]),
            resolve_extensions: strings(&[
                "ts", "tsx", "js", "jsx", "mjs", "cjs", "json", "css", "scss",
            ]),
            tools: ToolsConfig::default(),
            test_dir: PathBuf::from("tests/auto_generated"),
            generators: Vec::new(),
            schema_env: strings(&["SUPABASE_URL", "SUPABASE_SERVICE_ROLE"]),
            lock: LockConfig::default(),
            round_delay_ms: 0,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_protected() -> Vec<String> {
    let mut patterns = Vec::new();

    // Framework-reserved entrypoints
    for name in [
        "page",
        "layout",
        "route",
        "loading",
        "error",
        "not-found",
        "template",
        "middleware",
        "instrumentation",
    ] {
        patterns.push(format!("**/{}.{{ts,tsx,js,jsx}}", name));
    }

    patterns.extend(strings(&[
        // Static asset roots
        "public/**",
        "assets/**",
        "static/**",
        // Environment and secrets
        "**/.env",
        "**/.env.*",
        // Manifests and tool configuration
        "package.json",
        "**/package.json",
        "package-lock.json",
        "pnpm-lock.yaml",
        "yarn.lock",
        "bun.lockb",
        "**/tsconfig*.json",
        "**/jsconfig*.json",
        "*.config.*",
        ".*",
        "Dockerfile",
        "Makefile",
        // Documentation
        "**/*.md",
        "**/*.mdx",
        "LICENSE*",
    ]));
    patterns
}

/// A single external command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Marker files (relative to root); the tool is skipped unless one exists
    pub requires: Vec<String>,
    pub enabled: bool,
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            requires: Vec::new(),
            enabled: true,
        }
    }
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: strings(args),
            ..Default::default()
        }
    }

    pub fn requiring(mut self, markers: &[&str]) -> Self {
        self.requires = strings(markers);
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub formatter: ToolCommand,
    pub linter: ToolCommand,
    pub typecheck: ToolCommand,
    pub test_runner: ToolCommand,
    pub schema_puller: ToolCommand,
    pub graph_tool: ToolCommand,
    /// Per-invocation limit before the tool is terminated
    pub timeout_secs: u64,
    /// Time between the terminate request and the hard kill
    pub kill_grace_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            formatter: ToolCommand::new("prettier", &["--write", "."]).requiring(&[
                ".prettierrc",
                ".prettierrc.json",
                ".prettierrc.js",
                "prettier.config.js",
                "package.json",
            ]),
            linter: ToolCommand::new("eslint", &["--fix", "."]).requiring(&[
                ".eslintrc",
                ".eslintrc.json",
                ".eslintrc.js",
                "eslint.config.js",
                "eslint.config.mjs",
            ]),
            typecheck: ToolCommand::new("tsc", &["--noEmit"]).requiring(&["tsconfig.json"]),
            test_runner: ToolCommand::new("playwright", &["test", "{test_dir}", "--reporter=list"]),
            schema_puller: ToolCommand::new(
                "supabase",
                &["db", "dump", "--schema-only", "--file", "migration_workdir/schema.sql"],
            ),
            graph_tool: ToolCommand::new("madge", &["--json", "."]),
            timeout_secs: 300,
            kill_grace_ms: 2000,
        }
    }
}

impl ToolsConfig {
    /// Every tool switched off; rounds then only scan, analyze and quarantine
    pub fn all_disabled() -> Self {
        Self {
            formatter: ToolCommand::disabled(),
            linter: ToolCommand::disabled(),
            typecheck: ToolCommand::disabled(),
            test_runner: ToolCommand::disabled(),
            schema_puller: ToolCommand::disabled(),
            graph_tool: ToolCommand::disabled(),
            ..Default::default()
        }
    }
}

/// An opaque per-round step such as a test or migration generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub name: String,
    #[serde(flatten)]
    pub command: ToolCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// A lease not refreshed within this window is considered abandoned
    pub lease_ttl_secs: u64,
    /// How long to wait for a live lease before giving up
    pub wait_secs: u64,
    pub poll_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: 900,
            wait_secs: 2,
            poll_ms: 200,
        }
    }
}

impl Config {
    /// Load a config file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self, FatalSetupError> {
        let content = std::fs::read_to_string(path).map_err(|e| FatalSetupError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<Config>(&content).map_err(|e| e.to_string()),
            _ => serde_yaml::from_str::<Config>(&content).map_err(|e| e.to_string()),
        };

        parsed
            .map(Config::normalized)
            .map_err(|message| FatalSetupError::Config {
                path: path.to_path_buf(),
                message,
            })
    }

    /// Load the first config file found in `root`, or the defaults
    pub fn from_default_locations(root: &Path) -> Result<Self, FatalSetupError> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = root.join(name);
            if candidate.is_file() {
                tracing::debug!("Loading config from {}", candidate.display());
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Clamp round limits into a consistent range
    pub fn normalized(mut self) -> Self {
        self.max_rounds = self.max_rounds.max(1);
        self.min_rounds_before_stop = self.min_rounds_before_stop.min(self.max_rounds);
        self
    }

    /// Names the scanner must skip, including the orchestrator's own areas
    pub fn scan_ignores(&self) -> Vec<String> {
        let mut names = self.ignore.clone();
        for own in [&self.quarantine_root, &self.state_dir] {
            let own = own.to_string_lossy().trim_end_matches('/').to_string();
            if !own.is_empty() && !names.contains(&own) {
                names.push(own);
            }
        }
        names
    }

    /// Protected globs, including everything under the test runner's directory
    pub fn protected_patterns(&self) -> Vec<String> {
        let mut patterns = self.protected.clone();
        let test_dir = self.test_dir.to_string_lossy().replace('\\', "/");
        let test_dir = test_dir.trim_start_matches("./").trim_matches('/');
        if !test_dir.is_empty() && test_dir != "." {
            let pattern = format!("{}/**", globset::escape(test_dir));
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        patterns
    }

    /// The SchemaPuller capability flag; values are never inspected
    pub fn schema_credentials_present(&self) -> bool {
        !self.schema_env.is_empty()
            && self
                .schema_env
                .iter()
                .all(|key| std::env::var_os(key).is_some_and(|v| !v.is_empty()))
    }
}
