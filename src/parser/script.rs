//! JavaScript / TypeScript specifier extraction
//!
//! A conservative regex matcher. It does not strip comments, so a commented
//! out import still counts as a reference; that errs on the side of keeping
//! files.

use super::common::{push_unique, Specifier, SpecifierExtractor, SpecifierKind};
use regex::Regex;

const EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];

pub struct ScriptExtractor {
    patterns: Vec<(Regex, SpecifierKind)>,
}

impl ScriptExtractor {
    pub fn new() -> Self {
        let patterns = vec![
            (
                r#"(?m)\bimport\s+(?:type\s+)?(?:[\w*{}\s,$]+?\s+from\s+)?["']([^"'\n]+)["']"#,
                SpecifierKind::Import,
            ),
            (
                r#"(?m)\bexport\s+(?:type\s+)?(?:[\w*{}\s,$]+?\s+)?from\s+["']([^"'\n]+)["']"#,
                SpecifierKind::ReExport,
            ),
            (
                r#"\brequire\s*\(\s*["'`]([^"'`\n]+)["'`]\s*\)"#,
                SpecifierKind::Require,
            ),
            (
                r#"\bimport\s*\(\s*["'`]([^"'`\n]+)["'`]\s*\)"#,
                SpecifierKind::DynamicImport,
            ),
            (
                r#"\b(?:jest|vi)\.(?:mock|requireActual|importActual)\s*\(\s*["'`]([^"'`\n]+)["'`]"#,
                SpecifierKind::DynamicImport,
            ),
        ];

        Self {
            patterns: patterns
                .into_iter()
                .map(|(p, kind)| (Regex::new(p).expect("valid script pattern"), kind))
                .collect(),
        }
    }
}

impl Default for ScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecifierExtractor for ScriptExtractor {
    fn name(&self) -> &'static str {
        "script"
    }

    fn handles(&self, extension: &str) -> bool {
        EXTENSIONS.contains(&extension)
    }

    fn extract(&self, source: &str) -> Vec<Specifier> {
        let mut out = Vec::new();
        for (pattern, kind) in &self.patterns {
            for caps in pattern.captures_iter(source) {
                if let Some(m) = caps.get(1) {
                    push_unique(&mut out, m.as_str(), *kind);
                }
            }
        }
        out
    }
}
