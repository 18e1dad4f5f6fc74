mod common;
mod fallback;
mod script;
mod style;

pub use common::{ExtractorRegistry, Specifier, SpecifierExtractor, SpecifierKind};
pub use fallback::RelativeLiteralExtractor;
pub use script::ScriptExtractor;
pub use style::StyleExtractor;
