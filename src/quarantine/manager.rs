use super::{sha256_file, MoveMethod, QuarantineEntry, RestoreIndex};
use crate::analysis::Candidate;
use crate::discovery::relative_path;
use crate::error::{FatalSetupError, QuarantineError};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Moves candidates into the run's quarantine directory and keeps the
/// restore index in step. All moves go through `&mut self`, so they are
/// serialized by construction.
pub struct QuarantineManager {
    root: PathBuf,
    run_dir: PathBuf,
    index: RestoreIndex,
    copy_only: bool,
    copier: fn(&Path, &Path) -> io::Result<u64>,
    bytes_quarantined: u64,
}

fn copy_file(src: &Path, dest: &Path) -> io::Result<u64> {
    fs::copy(src, dest)
}

impl QuarantineManager {
    /// Create the run directory `<quarantine_root>/<run_id>`
    pub fn new(
        root: &Path,
        quarantine_root: &Path,
        run_id: &str,
        index_path: &Path,
    ) -> Result<Self, FatalSetupError> {
        let run_dir = root.join(quarantine_root).join(run_id);
        fs::create_dir_all(&run_dir).map_err(|e| FatalSetupError::directory(&run_dir, e))?;

        let run_dir_rel = relative_path(root, &run_dir).unwrap_or_else(|| run_id.to_string());
        Ok(Self {
            root: root.to_path_buf(),
            run_dir,
            index: RestoreIndex::create(index_path, run_id, &run_dir_rel),
            copy_only: false,
            copier: copy_file,
            bytes_quarantined: 0,
        })
    }

    /// Skip the rename attempt, e.g. when the quarantine root is known to be
    /// on another device
    pub fn with_copy_only(mut self, copy_only: bool) -> Self {
        self.copy_only = copy_only;
        self
    }

    /// Replace the file copy used by the copy fallback
    #[cfg(test)]
    fn with_copier(mut self, copier: fn(&Path, &Path) -> io::Result<u64>) -> Self {
        self.copier = copier;
        self
    }

    pub fn index(&self) -> &RestoreIndex {
        &self.index
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn bytes_quarantined(&self) -> u64 {
        self.bytes_quarantined
    }

    /// Quarantine one candidate. Never panics and never removes the original
    /// without a verified copy; failures come back as `method = failed`.
    pub fn quarantine(&mut self, candidate: &Candidate, round: u32) -> QuarantineEntry {
        let src = self.root.join(&candidate.path);
        let dest = self.run_dir.join(&candidate.path);

        let mut entry = QuarantineEntry {
            original_path: candidate.path.clone(),
            quarantine_path: relative_path(&self.root, &dest)
                .unwrap_or_else(|| dest.display().to_string()),
            round,
            timestamp: Utc::now(),
            method: MoveMethod::Failed,
            restore_available: false,
            sha256: None,
            size_bytes: candidate.size_bytes,
            tier: candidate.tier,
            reason: candidate.tier.reason().to_string(),
            original_retained: false,
            manual_review: false,
            error: None,
        };

        match self.transfer(&src, &dest) {
            Ok(transfer) => {
                entry.method = transfer.method;
                entry.sha256 = Some(transfer.sha256);
                entry.size_bytes = transfer.size;
                entry.original_retained = transfer.original_retained;
                entry.restore_available = true;
            }
            Err(err) => {
                entry.manual_review = matches!(
                    err,
                    QuarantineError::VerificationFailed { .. }
                        | QuarantineError::DestinationExists(_)
                );
                if entry.manual_review {
                    warn!("Manual review required for {}: {}", candidate.path, err);
                } else {
                    warn!("Could not quarantine {}: {}", candidate.path, err);
                }
                entry.error = Some(err.to_string());
                return entry;
            }
        }

        if let Err(err) = self.index.append(entry.clone()) {
            // Without an index entry the move cannot be restored; undo it.
            warn!("Restore index update failed for {}: {}", candidate.path, err);
            self.undo(&src, &dest, entry.method);
            entry.method = MoveMethod::Failed;
            entry.restore_available = false;
            entry.manual_review = true;
            entry.error = Some(err.to_string());
            return entry;
        }

        self.bytes_quarantined += entry.size_bytes;
        info!(
            "Quarantined {} ({}, {} bytes)",
            candidate.path,
            entry.method.as_str(),
            entry.size_bytes
        );
        entry
    }

    fn transfer(&self, src: &Path, dest: &Path) -> Result<Transfer, QuarantineError> {
        if !src.is_file() {
            return Err(QuarantineError::MissingSource(src.to_path_buf()));
        }
        if dest.exists() {
            return Err(QuarantineError::DestinationExists(dest.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| QuarantineError::io(parent, e))?;
        }

        let sha256 = sha256_file(src).map_err(|e| QuarantineError::io(src, e))?;
        let size = fs::metadata(src).map(|m| m.len()).unwrap_or(0);

        if !self.copy_only {
            match fs::rename(src, dest) {
                Ok(()) => {
                    let actual = sha256_file(dest).map_err(|e| QuarantineError::io(dest, e))?;
                    if actual != sha256 {
                        let _ = fs::rename(dest, src);
                        return Err(QuarantineError::VerificationFailed {
                            path: src.to_path_buf(),
                            expected: sha256,
                            actual,
                        });
                    }
                    return Ok(Transfer {
                        method: MoveMethod::Moved,
                        sha256,
                        size,
                        original_retained: false,
                    });
                }
                Err(err) => {
                    debug!("Rename of {} failed ({}), copying instead", src.display(), err);
                }
            }
        }

        self.copy_and_verify(src, dest, sha256, size)
    }

    fn copy_and_verify(
        &self,
        src: &Path,
        dest: &Path,
        sha256: String,
        size: u64,
    ) -> Result<Transfer, QuarantineError> {
        if let Err(err) = (self.copier)(src, dest) {
            let _ = fs::remove_file(dest);
            return Err(QuarantineError::io(dest, err));
        }

        let actual = match sha256_file(dest) {
            Ok(digest) => digest,
            Err(err) => {
                let _ = fs::remove_file(dest);
                return Err(QuarantineError::io(dest, err));
            }
        };
        if actual != sha256 {
            let _ = fs::remove_file(dest);
            return Err(QuarantineError::VerificationFailed {
                path: src.to_path_buf(),
                expected: sha256,
                actual,
            });
        }

        let original_retained = match fs::remove_file(src) {
            Ok(()) => false,
            Err(err) => {
                warn!(
                    "Verified copy of {} exists but the original could not be removed: {}",
                    src.display(),
                    err
                );
                true
            }
        };

        Ok(Transfer {
            method: MoveMethod::Copied,
            sha256,
            size,
            original_retained,
        })
    }

    fn undo(&self, src: &Path, dest: &Path, method: MoveMethod) {
        let result = match method {
            MoveMethod::Moved => fs::rename(dest, src),
            _ if src.exists() => fs::remove_file(dest),
            _ => fs::copy(dest, src).and_then(|_| fs::remove_file(dest)),
        };
        if let Err(err) = result {
            warn!(
                "Could not undo quarantine of {}; the file is at {}: {}",
                src.display(),
                dest.display(),
                err
            );
        }
    }
}

struct Transfer {
    method: MoveMethod,
    sha256: String,
    size: u64,
    original_retained: bool,
}
