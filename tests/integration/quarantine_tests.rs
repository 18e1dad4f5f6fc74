//! Integration tests for quarantine and restore
//!
//! Files go into the quarantine, the restore index is reloaded from disk and
//! replayed, and the restored bytes must match the originals.

use repohygiene::analysis::{Candidate, CandidateTier};
use repohygiene::quarantine::{
    replay, sha256_file, Archiver, MoveMethod, QuarantineManager, RestoreIndex, TarGzArchiver,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RUN_ID: &str = "2026-01-01T00-00-00-000Z";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn candidate(path: &str, size: u64) -> Candidate {
    Candidate {
        path: path.to_string(),
        discovered_round: 1,
        protected_match: false,
        tier: CandidateTier::Unreferenced,
        size_bytes: size,
    }
}

fn manager(root: &Path) -> QuarantineManager {
    let index_path = root.join(".repohygiene/runs").join(RUN_ID).join("restore-index.json");
    QuarantineManager::new(root, Path::new(".isolated_trash"), RUN_ID, &index_path).unwrap()
}

fn quarantine_all(root: &Path, files: &[(&str, &str)]) -> QuarantineManager {
    let mut manager = manager(root);
    for (path, content) in files {
        write(root, path, content);
    }
    for (path, content) in files {
        let entry = manager.quarantine(&candidate(path, content.len() as u64), 1);
        assert!(entry.succeeded(), "{} failed: {:?}", path, entry.error);
    }
    manager
}

// ============================================================================
// Round trip
// ============================================================================

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_quarantine_preserves_bytes_and_relative_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/old/helper.ts", "export const helper = 42;\n");
        let before = sha256_file(&root.join("src/old/helper.ts")).unwrap();

        let mut manager = manager(root);
        let entry = manager.quarantine(&candidate("src/old/helper.ts", 26), 2);

        assert_eq!(entry.method, MoveMethod::Moved);
        assert_eq!(entry.round, 2);
        assert_eq!(
            entry.quarantine_path,
            format!(".isolated_trash/{}/src/old/helper.ts", RUN_ID)
        );
        assert!(!root.join("src/old/helper.ts").exists());
        assert_eq!(
            sha256_file(&root.join(&entry.quarantine_path)).unwrap(),
            before
        );
        assert_eq!(entry.sha256.as_deref(), Some(before.as_str()));
        assert_eq!(manager.bytes_quarantined(), 26);
    }

    #[test]
    fn test_index_reloads_from_disk() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let manager = quarantine_all(root, &[("a.ts", "a"), ("lib/b.ts", "bb")]);

        let loaded = RestoreIndex::load(manager.index().path()).unwrap();
        assert_eq!(loaded.run_id(), RUN_ID);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.get("lib/b.ts").unwrap().restore_available);
    }

    #[test]
    fn test_restore_after_originals_were_recreated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let files = [("src/a.ts", "alpha\n"), ("src/styles/b.css", ".b{}\n")];
        let manager = quarantine_all(root, &files);

        // Someone recreated one of the paths with different content
        write(root, "src/a.ts", "stale");

        let index = RestoreIndex::load(manager.index().path()).unwrap();
        let report = replay(root, &index);

        assert!(report.is_complete(), "{:?}", report.failed);
        assert_eq!(report.restored.len(), 2);
        for (path, content) in files {
            assert_eq!(fs::read_to_string(root.join(path)).unwrap(), content);
        }
        // The quarantine copy is kept so a replay can be repeated
        assert!(root
            .join(".isolated_trash")
            .join(RUN_ID)
            .join("src/a.ts")
            .exists());
    }

    #[test]
    fn test_tampered_quarantine_copy_is_not_restored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let manager = quarantine_all(root, &[("a.ts", "alpha"), ("b.ts", "beta")]);

        write(root, &format!(".isolated_trash/{}/a.ts", RUN_ID), "tampered");

        let index = RestoreIndex::load(manager.index().path()).unwrap();
        let report = replay(root, &index);

        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a.ts");
        assert_eq!(report.restored, vec!["b.ts"]);
        assert!(!root.join("a.ts").exists());
    }
}

// ============================================================================
// Failure handling
// ============================================================================

mod failure_tests {
    use super::*;

    #[test]
    fn test_failed_entries_are_not_indexed() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(dir.path());

        let entry = manager.quarantine(&candidate("gone.ts", 0), 1);
        assert_eq!(entry.method, MoveMethod::Failed);
        assert!(!entry.restore_available);
        assert!(manager.index().is_empty());
    }

    #[test]
    fn test_collision_in_quarantine_needs_manual_review() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "dup.ts", "live");
        write(root, &format!(".isolated_trash/{}/dup.ts", RUN_ID), "older");

        let mut manager = manager(root);
        let entry = manager.quarantine(&candidate("dup.ts", 4), 1);

        assert_eq!(entry.method, MoveMethod::Failed);
        assert!(entry.manual_review);
        assert_eq!(fs::read_to_string(root.join("dup.ts")).unwrap(), "live");
    }

    #[test]
    fn test_copy_only_mode_still_removes_the_original() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "x.ts", "x");

        let mut manager = manager(root).with_copy_only(true);
        let entry = manager.quarantine(&candidate("x.ts", 1), 1);

        assert_eq!(entry.method, MoveMethod::Copied);
        assert!(!entry.original_retained);
        assert!(!root.join("x.ts").exists());
    }
}

// ============================================================================
// Rollback bundle
// ============================================================================

mod bundle_tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[test]
    fn test_bundle_contains_every_quarantined_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        quarantine_all(root, &[("a.ts", "a"), ("deep/er/b.ts", "b")]);

        let bundle = root.join("bundle.tar.gz");
        let count = TarGzArchiver
            .archive(&root.join(".isolated_trash"), &bundle)
            .unwrap();
        assert_eq!(count, 2);

        let mut archive = tar::Archive::new(GzDecoder::new(fs::File::open(&bundle).unwrap()));
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.header().entry_type().is_file())
            .map(|e| e.path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![format!("{}/a.ts", RUN_ID), format!("{}/deep/er/b.ts", RUN_ID)]
        );
    }
}
