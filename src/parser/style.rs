//! Stylesheet specifier extraction (`@import`, `url()`)

use super::common::{push_unique, Specifier, SpecifierExtractor, SpecifierKind};
use regex::Regex;

const EXTENSIONS: [&str; 4] = ["css", "scss", "sass", "less"];

pub struct StyleExtractor {
    import: Regex,
    url: Regex,
}

impl StyleExtractor {
    pub fn new() -> Self {
        Self {
            import: Regex::new(r#"@(?:import|use|forward)\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?"#)
                .expect("valid import pattern"),
            url: Regex::new(r#"url\(\s*["']?([^"')\s]+)["']?\s*\)"#).expect("valid url pattern"),
        }
    }
}

impl Default for StyleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_external(raw: &str) -> bool {
    raw.starts_with("data:")
        || raw.starts_with("http:")
        || raw.starts_with("https:")
        || raw.starts_with("//")
        || raw.starts_with('#')
}

impl SpecifierExtractor for StyleExtractor {
    fn name(&self) -> &'static str {
        "style"
    }

    fn handles(&self, extension: &str) -> bool {
        EXTENSIONS.contains(&extension)
    }

    fn extract(&self, source: &str) -> Vec<Specifier> {
        let mut out = Vec::new();
        for caps in self.import.captures_iter(source) {
            if let Some(m) = caps.get(1) {
                if !is_external(m.as_str()) {
                    push_unique(&mut out, m.as_str(), SpecifierKind::StyleImport);
                }
            }
        }
        for caps in self.url.captures_iter(source) {
            if let Some(m) = caps.get(1) {
                if !is_external(m.as_str()) {
                    push_unique(&mut out, m.as_str(), SpecifierKind::Url);
                }
            }
        }
        out
    }
}
