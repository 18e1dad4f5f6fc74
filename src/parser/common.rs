//! Specifier extraction seam
//!
//! Each source grammar gets its own [`SpecifierExtractor`]. The registry picks
//! the first extractor that claims an extension and falls back to the
//! conservative relative-literal scanner for everything else.

use super::{RelativeLiteralExtractor, ScriptExtractor, StyleExtractor};
use serde::{Deserialize, Serialize};

/// How a specifier appeared in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecifierKind {
    /// `import x from '...'` or a side-effect `import '...'`
    Import,
    /// `export ... from '...'`
    ReExport,
    /// `require('...')`
    Require,
    /// `import('...')` and test-framework module mocks
    DynamicImport,
    /// CSS `@import`
    StyleImport,
    /// CSS `url(...)`
    Url,
    /// Any quoted relative path, matched by the fallback scanner
    Literal,
}

/// A string token naming another module or file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Specifier {
    pub raw: String,
    pub kind: SpecifierKind,
}

impl Specifier {
    pub fn new(raw: impl Into<String>, kind: SpecifierKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    /// Relative specifiers start with `.` or `/` and can be resolved locally
    pub fn is_relative(&self) -> bool {
        self.raw.starts_with('.') || self.raw.starts_with('/')
    }
}

/// Extracts specifiers from the text of one source file
pub trait SpecifierExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether this extractor understands files with `extension`
    fn handles(&self, extension: &str) -> bool;

    /// Extract specifiers in order of appearance, without duplicates
    fn extract(&self, source: &str) -> Vec<Specifier>;
}

/// Ordered set of extractors with a catch-all fallback
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn SpecifierExtractor>>,
    fallback: Box<dyn SpecifierExtractor>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![Box::new(ScriptExtractor::new()), Box::new(StyleExtractor::new())],
            fallback: Box::new(RelativeLiteralExtractor::new()),
        }
    }

    /// Registry that only knows the fallback scanner
    pub fn conservative() -> Self {
        Self {
            extractors: Vec::new(),
            fallback: Box::new(RelativeLiteralExtractor::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn SpecifierExtractor>) -> Self {
        self.extractors.insert(0, extractor);
        self
    }

    pub fn for_extension(&self, extension: &str) -> &dyn SpecifierExtractor {
        self.extractors
            .iter()
            .find(|e| e.handles(extension))
            .map(|e| e.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Push unless an identical specifier was already recorded
pub(crate) fn push_unique(out: &mut Vec<Specifier>, raw: &str, kind: SpecifierKind) {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains("${") {
        return;
    }
    if !out.iter().any(|s| s.raw == raw && s.kind == kind) {
        out.push(Specifier::new(raw, kind));
    }
}
