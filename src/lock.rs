//! Lease-based advisory lock
//!
//! One orchestrator per repository root. The holder writes a lease with an
//! expiry and refreshes it at every phase boundary; a lease whose expiry has
//! passed belongs to a crashed holder and may be taken over.

use crate::artifact::write_json_atomic;
use crate::config::LockConfig;
use crate::error::LockError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const LOCK_FILE_NAME: &str = "orchestrator.lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub pid: u32,
    pub run_id: String,
    pub acquired_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    fn new(run_id: &str, ttl: ChronoDuration) -> Self {
        let now = Utc::now();
        Self {
            pid: std::process::id(),
            run_id: run_id.to_string(),
            acquired_at: now,
            heartbeat_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A held lease. Released on drop.
#[derive(Debug)]
pub struct LeaseLock {
    path: PathBuf,
    lease: Lease,
    ttl: ChronoDuration,
    released: bool,
}

impl LeaseLock {
    /// Acquire the lock at `path`, waiting up to `wait_secs` for a live holder
    pub fn acquire(path: &Path, config: &LockConfig, run_id: &str) -> Result<Self, LockError> {
        let ttl = ChronoDuration::seconds(config.lease_ttl_secs.max(1) as i64);
        let wait = Duration::from_secs(config.wait_secs);
        let poll = Duration::from_millis(config.poll_ms.max(10));
        let started = Instant::now();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        loop {
            let lease = Lease::new(run_id, ttl);
            match create_exclusive(path, &lease) {
                Ok(()) => {
                    debug!("Acquired lock {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                        lease,
                        ttl,
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => {
                    return Err(LockError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }

            match read_lease(path) {
                Some(existing) if !existing.is_expired(Utc::now()) => {
                    if started.elapsed() >= wait {
                        return Err(LockError::Held {
                            path: path.to_path_buf(),
                            pid: existing.pid,
                            expires_at: existing.expires_at.to_rfc3339(),
                        });
                    }
                    thread::sleep(poll);
                }
                Some(existing) => {
                    warn!(
                        "Taking over expired lock held by pid {} (expired {})",
                        existing.pid, existing.expires_at
                    );
                    take_over(path, Some(&existing))?;
                }
                None => {
                    warn!("Lock file {} is unreadable, replacing it", path.display());
                    take_over(path, None)?;
                }
            }
        }
    }

    /// Extend the lease. Errors are logged; a failed heartbeat only shortens
    /// the window before another instance may take over.
    ///
    /// Returns false once the lock file no longer carries our lease. The
    /// file is then left alone so the new holder keeps its lease.
    pub fn heartbeat(&mut self) -> bool {
        if !self.still_held() {
            warn!(
                "Lock {} was taken over; not refreshing it",
                self.path.display()
            );
            return false;
        }
        let now = Utc::now();
        self.lease.heartbeat_at = now;
        self.lease.expires_at = now + self.ttl;
        if let Err(err) = write_json_atomic(&self.path, &self.lease) {
            warn!("Lock heartbeat failed: {}", err);
        }
        true
    }

    /// Whether the lock file still carries the lease we acquired
    pub fn still_held(&self) -> bool {
        read_lease(&self.path).map_or(false, |current| same_lease(&current, &self.lease))
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file if it still carries our lease
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if !self.still_held() {
            warn!("Lock {} was taken over; leaving it", self.path.display());
        } else if let Err(err) = fs::remove_file(&self.path) {
            warn!("Could not remove lock {}: {}", self.path.display(), err);
        } else {
            debug!("Released lock {}", self.path.display());
        }
    }
}

impl Drop for LeaseLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Publish a fully written lease under `path`, failing if it already exists
fn create_exclusive(path: &Path, lease: &Lease) -> io::Result<()> {
    let body = serde_json::to_vec_pretty(lease).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    // hard_link never replaces an existing file, so readers never see a partial lease
    let result = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match result {
        Err(err) if err.kind() != io::ErrorKind::AlreadyExists => {
            let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
            file.write_all(&body)?;
            file.sync_all()
        }
        other => other,
    }
}

/// Discard the stale lease at `path`, provided it is still the one judged stale
///
/// The file is renamed aside first so only one contender can claim a given
/// lease. If the moved file turns out to be a newer lease, it is linked back.
fn take_over(path: &Path, stale: Option<&Lease>) -> Result<(), LockError> {
    let aside = path.with_extension(format!("{}.stale", std::process::id()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        // Another contender got there first
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    let moved = read_lease(&aside);
    let unchanged = match (stale, moved.as_ref()) {
        (Some(stale), Some(moved)) => same_lease(stale, moved),
        (None, None) => true,
        _ => false,
    };
    if !unchanged {
        debug!("Lock {} changed hands during takeover, restoring it", path.display());
        if let Err(err) = fs::hard_link(&aside, path) {
            warn!("Could not restore lock {}: {}", path.display(), err);
        }
    }
    remove_if_present(&aside)
}

fn same_lease(a: &Lease, b: &Lease) -> bool {
    a.pid == b.pid && a.acquired_at == b.acquired_at
}

fn read_lease(path: &Path) -> Option<Lease> {
    let content = fs::read(path).ok()?;
    serde_json::from_slice(&content).ok()
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
