//! Quarantine: the only code path allowed to move files out of the live tree
//!
//! Files are mirrored into `<quarantine_root>/<run-id>/<relative path>`. A
//! rename is attempted first; on failure the file is copied and the copy is
//! verified by SHA-256 before the original is removed. The original is never
//! removed without a verified copy.

mod archive;
mod index;
mod manager;
mod restore;

pub use archive::{Archiver, TarGzArchiver};
pub use index::{RestoreIndex, INDEX_FILE_NAME};
pub use manager::QuarantineManager;
pub use restore::{replay, RestoreReport};

use crate::analysis::CandidateTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// How a candidate left the live tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMethod {
    Moved,
    Copied,
    Failed,
}

impl MoveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveMethod::Moved => "moved",
            MoveMethod::Copied => "copied",
            MoveMethod::Failed => "failed",
        }
    }
}

/// Record of one processed candidate. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineEntry {
    pub original_path: String,
    pub quarantine_path: String,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
    pub method: MoveMethod,
    pub restore_available: bool,
    /// Digest of the original captured before the move
    pub sha256: Option<String>,
    pub size_bytes: u64,
    pub tier: CandidateTier,
    pub reason: String,
    /// A verified copy exists but the original could not be removed
    #[serde(default)]
    pub original_retained: bool,
    /// The copy could not be verified; a human has to look at this file
    #[serde(default)]
    pub manual_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuarantineEntry {
    pub fn succeeded(&self) -> bool {
        matches!(self.method, MoveMethod::Moved | MoveMethod::Copied)
    }
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
