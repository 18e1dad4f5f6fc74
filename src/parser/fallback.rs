//! Grammar-agnostic fallback: any quoted string that looks like a relative
//! path. Used for file types without a dedicated extractor.

use super::common::{push_unique, Specifier, SpecifierExtractor, SpecifierKind};
use regex::Regex;

pub struct RelativeLiteralExtractor {
    literal: Regex,
}

impl RelativeLiteralExtractor {
    pub fn new() -> Self {
        Self {
            literal: Regex::new(r#"["'`](\.{1,2}/[^"'`\s]+)["'`]"#).expect("valid literal pattern"),
        }
    }
}

impl Default for RelativeLiteralExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecifierExtractor for RelativeLiteralExtractor {
    fn name(&self) -> &'static str {
        "relative-literal"
    }

    fn handles(&self, _extension: &str) -> bool {
        true
    }

    fn extract(&self, source: &str) -> Vec<Specifier> {
        let mut out = Vec::new();
        for caps in self.literal.captures_iter(source) {
            if let Some(m) = caps.get(1) {
                push_unique(&mut out, m.as_str(), SpecifierKind::Literal);
            }
        }
        out
    }
}
