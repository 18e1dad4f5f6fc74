use super::{sha256_file, RestoreIndex};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of replaying a restore index
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub run_id: String,
    pub restored: Vec<String>,
    /// `(original path, error)` pairs
    pub failed: Vec<(String, String)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy every indexed file back to its original location.
///
/// The quarantine copy is left in place so a replay can be repeated. Files
/// that were recreated in the live tree since the run are overwritten.
pub fn replay(root: &Path, index: &RestoreIndex) -> RestoreReport {
    let mut report = RestoreReport {
        run_id: index.run_id().to_string(),
        ..Default::default()
    };

    for entry in index.entries().filter(|e| e.restore_available) {
        match restore_one(root, &entry.quarantine_path, &entry.original_path, entry.sha256.as_deref()) {
            Ok(()) => {
                info!("Restored {}", entry.original_path);
                report.restored.push(entry.original_path.clone());
            }
            Err(err) => {
                warn!("Could not restore {}: {}", entry.original_path, err);
                report.failed.push((entry.original_path.clone(), err));
            }
        }
    }

    report
}

fn restore_one(
    root: &Path,
    quarantine_path: &str,
    original_path: &str,
    expected: Option<&str>,
) -> Result<(), String> {
    let src = root.join(quarantine_path);
    let dest = root.join(original_path);

    if !src.is_file() {
        return Err(format!("quarantined copy {} is missing", quarantine_path));
    }
    if let Some(expected) = expected {
        let actual = sha256_file(&src).map_err(|e| e.to_string())?;
        if actual != expected {
            return Err(format!(
                "quarantined copy changed since the run (expected {}, found {})",
                expected, actual
            ));
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::copy(&src, &dest).map_err(|e| e.to_string())?;

    if let Some(expected) = expected {
        let actual = sha256_file(&dest).map_err(|e| e.to_string())?;
        if actual != expected {
            return Err(format!("restored file does not match {}", expected));
        }
    }
    Ok(())
}
