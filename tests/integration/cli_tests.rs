//! End-to-end tests for the `repohygiene` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/app/page.tsx", "import '../lib/used';\n");
    write(dir.path(), "src/lib/used.ts", "export {};\n");
    write(dir.path(), "src/lib/orphan.ts", "export {};\n");
    dir
}

fn repohygiene() -> Command {
    Command::cargo_bin("repohygiene").unwrap()
}

fn only_run_id(root: &Path) -> String {
    let mut runs: Vec<String> = fs::read_dir(root.join(".repohygiene/runs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(runs.len(), 1);
    runs.remove(0)
}

#[test]
fn test_run_writes_final_report() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--max-rounds", "2", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("report.json"));

    assert!(dir.path().join(".repohygiene/final_report.json").exists());
    assert!(!dir.path().join("src/lib/orphan.ts").exists());
    assert!(dir.path().join("src/lib/used.ts").exists());
}

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--dry-run", "--quiet"])
        .assert()
        .success();

    assert!(dir.path().join("src/lib/orphan.ts").exists());
    assert!(!dir.path().join(".isolated_trash").exists());
}

#[test]
fn test_protect_flag_keeps_matching_files() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--quiet", "--max-rounds", "1", "--protect", "src/lib/orphan.ts"])
        .assert()
        .success();

    assert!(dir.path().join("src/lib/orphan.ts").exists());
}

#[test]
fn test_exclude_flag_keeps_root_and_its_imports() {
    let dir = fixture();
    write(dir.path(), "tools/seed.ts", "import '../src/lib/orphan';\n");

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--quiet", "--max-rounds", "2", "--exclude", "tools"])
        .assert()
        .success();

    // Excluded roots are still scanned, so their imports count as references
    assert!(dir.path().join("tools/seed.ts").exists());
    assert!(dir.path().join("src/lib/orphan.ts").exists());
}

#[test]
fn test_restore_round_trip() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--quiet", "--max-rounds", "1"])
        .assert()
        .success();
    assert!(!dir.path().join("src/lib/orphan.ts").exists());

    let run_id = only_run_id(dir.path());
    repohygiene()
        .arg(dir.path())
        .args(["--quiet", "--restore", &run_id])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(dir.path().join("src/lib/orphan.ts")).unwrap(),
        "export {};\n"
    );
}

#[test]
fn test_restore_unknown_run_fails() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .args(["--restore", "no-such-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-run"));
}

#[test]
fn test_list_runs() {
    let dir = fixture();

    repohygiene()
        .arg(dir.path())
        .arg("--list-runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded runs"));

    repohygiene()
        .arg(dir.path())
        .args(["--no-tools", "--quiet", "--max-rounds", "1"])
        .assert()
        .success();

    let run_id = only_run_id(dir.path());
    repohygiene()
        .arg(dir.path())
        .arg("--list-runs")
        .assert()
        .success()
        .stdout(predicate::str::contains(run_id));
}

#[test]
fn test_completions() {
    repohygiene()
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("repohygiene"));
}

#[test]
fn test_restore_conflicts_with_dry_run() {
    repohygiene()
        .args(["--restore", "x", "--dry-run"])
        .assert()
        .failure();
}
