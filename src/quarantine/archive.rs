//! Rollback bundles
//!
//! The quarantine tree is packed into a gzip-compressed tarball with a stable
//! entry order and zeroed ownership/mtime so identical trees produce identical
//! archives.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tar::Header;
use tracing::debug;

/// Packs a directory into a single restorable artifact
pub trait Archiver: Send + Sync {
    fn name(&self) -> &str;

    /// Archive `source_dir` into `dest`; returns the number of files written
    fn archive(&self, source_dir: &Path, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn name(&self) -> &str {
        "tar.gz"
    }

    fn archive(&self, source_dir: &Path, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let out = File::create(dest)
            .with_context(|| format!("failed to create bundle {}", dest.display()))?;
        let encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut files = 0u64;
        for entry in walkdir::WalkDir::new(source_dir)
            .sort_by(|a, b| a.path().cmp(b.path()))
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping path during archive walk: {}", err);
                    continue;
                }
            };
            let path = entry.path();
            if path == source_dir {
                continue;
            }
            let rel = path
                .strip_prefix(source_dir)
                .context("failed to relativize path")?;
            let rel = rel.to_string_lossy().replace('\\', "/");

            let metadata = fs::symlink_metadata(path)
                .with_context(|| format!("failed to stat {}", path.display()))?;
            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            if metadata.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, Path::new(&rel), std::io::empty())?;
            } else if metadata.is_file() {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(metadata.len());
                let file = File::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                builder.append_data(&mut header, Path::new(&rel), file)?;
                files += 1;
            }
        }

        let encoder = builder.into_inner().context("failed to finish tar stream")?;
        encoder.finish().context("failed to finish gzip stream")?;
        Ok(files)
    }
}
