use super::{Outcome, ToolInvoker};
use crate::config::ToolCommand;
use std::collections::BTreeMap;
use std::path::Path;

/// External dependency graph source whose edges are unioned into the
/// static graph
pub trait GraphTool: Send + Sync {
    fn name(&self) -> &str;

    /// `(from, to)` pairs, repository-relative
    fn edges(&self, root: &Path) -> Outcome<Vec<(String, String)>>;
}

/// `madge --json`: an object mapping each file to the files it imports
pub struct MadgeGraphTool {
    command: ToolCommand,
    invoker: ToolInvoker,
}

impl MadgeGraphTool {
    pub fn new(command: ToolCommand, invoker: ToolInvoker) -> Self {
        Self { command, invoker }
    }
}

impl GraphTool for MadgeGraphTool {
    fn name(&self) -> &str {
        &self.command.program
    }

    fn edges(&self, _root: &Path) -> Outcome<Vec<(String, String)>> {
        self.invoker.invoke(&self.command, &[]).and_then(|output| {
            if !output.success {
                return Outcome::failed(output.non_zero_exit().to_string());
            }
            parse_adjacency(&output.stdout).into()
        })
    }
}

/// Parse a `{ "file": ["dep", ...] }` adjacency document
pub fn parse_adjacency(json: &str) -> anyhow::Result<Vec<(String, String)>> {
    let start = json
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in graph tool output"))?;
    let map: BTreeMap<String, Vec<String>> = serde_json::from_str(&json[start..])?;

    Ok(map
        .into_iter()
        .flat_map(|(from, deps)| {
            let from = from.trim_start_matches("./").to_string();
            deps.into_iter()
                .map(move |to| (from.clone(), to.trim_start_matches("./").to_string()))
        })
        .collect())
}
