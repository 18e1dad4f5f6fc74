//! Restore index: append-only `originalPath -> entry` map for one run

use super::QuarantineEntry;
use crate::artifact::{read_json, write_json_atomic};
use crate::error::QuarantineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "restore-index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexDocument {
    run_id: String,
    quarantine_dir: String,
    entries: BTreeMap<String, QuarantineEntry>,
}

#[derive(Debug)]
pub struct RestoreIndex {
    path: PathBuf,
    doc: IndexDocument,
}

impl RestoreIndex {
    /// Start an empty index for a run; nothing is written until the first entry
    pub fn create(path: &Path, run_id: &str, quarantine_dir: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            doc: IndexDocument {
                run_id: run_id.to_string(),
                quarantine_dir: quarantine_dir.to_string(),
                entries: BTreeMap::new(),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self, QuarantineError> {
        let doc = read_json(path).map_err(|e| QuarantineError::Index {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// Append a successful entry and persist. An original path can only be
    /// recorded once per run.
    pub fn append(&mut self, entry: QuarantineEntry) -> Result<(), QuarantineError> {
        if self.doc.entries.contains_key(&entry.original_path) {
            return Err(QuarantineError::Index {
                path: self.path.clone(),
                message: format!("{} is already indexed", entry.original_path),
            });
        }
        let key = entry.original_path.clone();
        self.doc.entries.insert(key.clone(), entry);
        if let Err(e) = self.save() {
            self.doc.entries.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), QuarantineError> {
        write_json_atomic(&self.path, &self.doc).map_err(|e| QuarantineError::io(&self.path, e))
    }

    pub fn get(&self, original_path: &str) -> Option<&QuarantineEntry> {
        self.doc.entries.get(original_path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &QuarantineEntry> {
        self.doc.entries.values()
    }

    pub fn len(&self) -> usize {
        self.doc.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.entries.is_empty()
    }

    pub fn run_id(&self) -> &str {
        &self.doc.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
