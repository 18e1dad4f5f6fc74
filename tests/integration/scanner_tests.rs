//! Integration tests for file discovery
//!
//! These tests build scratch repositories and check what the scanner sees.

use repohygiene::config::Config;
use repohygiene::discovery::FileFinder;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scanned_paths(root: &Path, config: &Config) -> Vec<String> {
    FileFinder::new(config)
        .scan(root)
        .files
        .into_iter()
        .map(|f| f.path)
        .collect()
}

// ============================================================================
// Ignore handling
// ============================================================================

mod ignore_tests {
    use super::*;

    #[test]
    fn test_dependency_and_vcs_dirs_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), "node_modules/react/index.js", "");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), ".next/cache/x.js", "");

        let paths = scanned_paths(dir.path(), &Config::default());
        assert_eq!(paths, vec!["src/a.ts"]);
    }

    #[test]
    fn test_quarantine_root_and_state_dir_are_never_rescanned() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), ".isolated_trash/run/src/old.ts", "");
        write(dir.path(), ".repohygiene/runs/run/report.json", "{}");

        let paths = scanned_paths(dir.path(), &Config::default());
        assert_eq!(paths, vec!["src/a.ts"]);
    }

    #[test]
    fn test_custom_quarantine_root_is_ignored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep.ts", "");
        write(dir.path(), "trash/x.ts", "");

        let config = Config {
            quarantine_root: "trash".into(),
            ..Default::default()
        };
        assert_eq!(scanned_paths(dir.path(), &config), vec!["keep.ts"]);
    }

    #[test]
    fn test_gitignore_is_respected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".gitignore", "generated/\n");
        write(dir.path(), "generated/out.js", "");
        write(dir.path(), "src/index.ts", "");

        let paths = scanned_paths(dir.path(), &Config::default());
        assert!(paths.contains(&"src/index.ts".to_string()));
        assert!(!paths.iter().any(|p| p.starts_with("generated/")));

        let config = Config {
            respect_gitignore: false,
            ..Default::default()
        };
        assert!(scanned_paths(dir.path(), &config).contains(&"generated/out.js".to_string()));
    }
}

// ============================================================================
// Ordering and metadata
// ============================================================================

mod record_tests {
    use super::*;

    #[test]
    fn test_output_is_sorted_and_relative() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "z.ts", "");
        write(dir.path(), "a/b/c.tsx", "");
        write(dir.path(), "a/a.css", "");

        let paths = scanned_paths(dir.path(), &Config::default());
        assert_eq!(paths, vec!["a/a.css", "a/b/c.tsx", "z.ts"]);
    }

    #[test]
    fn test_sizes_are_recorded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "five.js", "12345");

        let outcome = FileFinder::new(&Config::default()).scan(dir.path());
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].size_bytes, 5);
        assert!(outcome.files[0].last_modified.is_some());
        assert!(outcome.warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_a_warning_not_a_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.ts", "");
        write(dir.path(), "locked/secret.ts", "");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let outcome = FileFinder::new(&Config::default()).scan(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(outcome.files.iter().any(|f| f.path == "ok.ts"));
        // Root can read anything, so only assert the warning when the walk was denied
        if !outcome.files.iter().any(|f| f.path == "locked/secret.ts") {
            assert!(!outcome.warnings.is_empty());
        }
    }
}
