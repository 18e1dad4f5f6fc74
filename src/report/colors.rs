//! Shared color scheme for terminal output

use crate::analysis::CandidateTier;
use crate::tools::ToolStatus;
use colored::{ColoredString, Colorize};

/// Symbol and color per tool status
pub struct StatusSymbol;

impl StatusSymbol {
    pub fn colored(status: ToolStatus) -> ColoredString {
        match status {
            ToolStatus::Succeeded => "✓".green().bold(),
            ToolStatus::Skipped => "–".dimmed(),
            ToolStatus::Failed => "✖".red().bold(),
        }
    }

    pub fn label(status: ToolStatus) -> ColoredString {
        match status {
            ToolStatus::Succeeded => status.as_str().green(),
            ToolStatus::Skipped => status.as_str().dimmed(),
            ToolStatus::Failed => status.as_str().red().bold(),
        }
    }
}

/// Tier badge shown next to candidates
pub struct TierBadge;

impl TierBadge {
    pub fn colored(tier: CandidateTier) -> ColoredString {
        match tier {
            CandidateTier::LikelyJunk => "junk".yellow(),
            CandidateTier::Unreferenced => "dead".magenta(),
        }
    }
}

pub struct StructureColors;

impl StructureColors {
    pub fn file_path(text: &str) -> ColoredString {
        text.cyan()
    }

    pub fn header(text: &str) -> ColoredString {
        text.cyan().bold()
    }

    pub fn count(text: &str) -> ColoredString {
        text.white().bold()
    }
}

pub struct BoxChars;

impl BoxChars {
    pub fn heavy_line(width: usize) -> String {
        "━".repeat(width)
    }

    pub fn light_line(width: usize) -> String {
        "─".repeat(width)
    }
}

/// `1234567` -> `1.2 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
