//! Specifier resolution
//!
//! Relative specifiers are resolved against the referencing file's directory
//! (or the root for a leading `/`), normalized, and checked against the set of
//! known files. Bare specifiers are never resolved to local files.

use crate::config::Config;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matches a file in the tree
    Local(String),
    /// Relative, but no file matched; carries the normalized path
    Dangling(String),
    /// Relative path that climbs above the repository root
    OutsideRoot,
    /// Package or otherwise non-relative specifier
    Bare,
}

pub struct SpecifierResolver {
    aliases: BTreeMap<String, String>,
    extensions: Vec<String>,
}

impl SpecifierResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            aliases: config.aliases.clone(),
            extensions: config.resolve_extensions.clone(),
        }
    }

    pub fn resolve(&self, from: &str, raw: &str, known: &HashSet<String>) -> Resolution {
        let raw = strip_query(raw);

        let joined = if let Some(rooted) = self.apply_alias(raw) {
            rooted
        } else if let Some(rest) = raw.strip_prefix('/') {
            rest.to_string()
        } else if raw.starts_with('.') {
            match from.rsplit_once('/') {
                Some((dir, _)) => format!("{}/{}", dir, raw),
                None => raw.to_string(),
            }
        } else {
            return Resolution::Bare;
        };

        let Some(normalized) = normalize_path(&joined) else {
            return Resolution::OutsideRoot;
        };

        match self.try_extensions(&normalized, known) {
            Some(found) => Resolution::Local(found),
            None => Resolution::Dangling(normalized),
        }
    }

    fn apply_alias(&self, raw: &str) -> Option<String> {
        // Longest prefix wins so `@/lib/` beats `@/`
        self.aliases
            .iter()
            .filter(|(prefix, _)| raw.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, target)| format!("{}{}", target, &raw[prefix.len()..]))
    }

    fn try_extensions(&self, path: &str, known: &HashSet<String>) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        if known.contains(path) {
            return Some(path.to_string());
        }
        for ext in &self.extensions {
            let candidate = format!("{}.{}", path, ext);
            if known.contains(&candidate) {
                return Some(candidate);
            }
        }
        for ext in &self.extensions {
            let candidate = format!("{}/index.{}", path, ext);
            if known.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

fn strip_query(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

/// Collapse `.` and `..` segments. Returns `None` when the path escapes the root.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
