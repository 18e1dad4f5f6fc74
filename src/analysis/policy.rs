//! Protection rules and the junk-name heuristic

use crate::config::Config;
use crate::error::FatalSetupError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;

/// Protected globs plus excluded roots
pub struct ProtectionRules {
    patterns: Vec<String>,
    set: GlobSet,
    excluded_roots: Vec<String>,
}

impl ProtectionRules {
    pub fn new(patterns: &[String], excluded_roots: &[String]) -> Result<Self, FatalSetupError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| FatalSetupError::Config {
                path: PathBuf::from("protected"),
                message: format!("invalid pattern '{}': {}", pattern, e),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| FatalSetupError::Config {
            path: PathBuf::from("protected"),
            message: e.to_string(),
        })?;

        Ok(Self {
            patterns: patterns.to_vec(),
            set,
            excluded_roots: excluded_roots
                .iter()
                .map(|r| r.trim_matches('/').to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FatalSetupError> {
        Self::new(&config.protected_patterns(), &config.excluded_roots)
    }

    /// The first protected pattern matching `path`
    pub fn protected_by(&self, path: &str) -> Option<&str> {
        self.set
            .matches(path)
            .first()
            .map(|idx| self.patterns[*idx].as_str())
    }

    /// The excluded root containing `path`
    pub fn excluded_root(&self, path: &str) -> Option<&str> {
        self.excluded_roots
            .iter()
            .find(|root| path == root.as_str() || path.starts_with(&format!("{}/", root)))
            .map(String::as_str)
    }
}

/// Flags likely-removable files by name (mock, fixture, backup...)
pub struct JunkHeuristic {
    fragments: Vec<String>,
}

impl JunkHeuristic {
    pub fn new(fragments: &[String]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    /// Matches against the file name only, so a `tests/` directory does not
    /// taint everything below it
    pub fn matches(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
        self.fragments.iter().any(|f| name.contains(f.as_str()))
    }
}
