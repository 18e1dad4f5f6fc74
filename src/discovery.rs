//! File discovery
//!
//! Walks the repository and yields a stable, ignore-filtered list of
//! [`FileRecord`]s. Unreadable directories are skipped with a warning; a scan
//! always completes with whatever it could see.

use crate::config::Config;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// One file in the live tree, captured at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Repository-relative path with `/` separators
    pub path: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Extension without the dot, lowercased
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

/// Result of a scan: the files plus any non-fatal problems encountered
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<FileRecord>,
    pub warnings: Vec<String>,
}

/// Finds every file under a root, honouring the configured ignore set
pub struct FileFinder {
    ignored: Vec<String>,
    respect_gitignore: bool,
}

impl FileFinder {
    pub fn new(config: &Config) -> Self {
        Self {
            ignored: config.scan_ignores(),
            respect_gitignore: config.respect_gitignore,
        }
    }

    pub fn with_ignored(ignored: Vec<String>) -> Self {
        Self {
            ignored,
            respect_gitignore: false,
        }
    }

    /// Scan `root`; no side effects
    pub fn scan(&self, root: &Path) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let ignored = self.ignored.clone();
        let filter_root = root.to_path_buf();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_global(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_ignored(&filter_root, entry.path(), &ignored))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    outcome.warnings.push(err.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let Some(rel) = relative_path(root, entry.path()) else {
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!("Cannot stat {}: {}", rel, err);
                    outcome.warnings.push(format!("{}: {}", rel, err));
                    continue;
                }
            };

            outcome.files.push(FileRecord {
                path: rel,
                size_bytes: metadata.len(),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        outcome.files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            "Scanned {} files ({} warnings)",
            outcome.files.len(),
            outcome.warnings.len()
        );
        outcome
    }
}

fn is_ignored(root: &Path, path: &Path, ignored: &[String]) -> bool {
    if path == root {
        return false;
    }
    let Some(rel) = relative_path(root, path) else {
        return false;
    };
    ignored.iter().any(|pattern| {
        if pattern.contains('/') {
            rel == *pattern || rel.starts_with(&format!("{}/", pattern))
        } else {
            path.file_name().and_then(|n| n.to_str()) == Some(pattern.as_str())
        }
    })
}

/// `/`-separated path of `path` relative to `root`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
