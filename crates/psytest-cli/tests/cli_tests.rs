//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn psytest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("psytest").unwrap()
}

/// A workspace with a file-store config and the starter bank imported.
fn imported_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    psytest().current_dir(dir.path()).arg("init").assert().success();
    std::fs::write(
        dir.path().join("psytest.toml"),
        "seed = 7\n\n[store]\ntype = \"file\"\ndir = \"data\"\n\n[user]\nid = \"ana\"\n",
    )
    .unwrap();
    psytest()
        .current_dir(dir.path())
        .args(["import", "--bank", "banks/example.toml"])
        .assert()
        .success();
    dir
}

fn take(dir: &Path, test: &str, input: &str) -> assert_cmd::assert::Assert {
    psytest()
        .current_dir(dir)
        .args(["take", "--test", test])
        .write_stdin(input)
        .assert()
}

#[test]
fn validate_verbal_bank() {
    psytest()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks/verbal.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("25 questions"))
        .stdout(predicate::str::contains("All banks valid"));
}

#[test]
fn validate_directory() {
    psytest()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank: Verbal"));
}

#[test]
fn validate_nonexistent_file() {
    psytest()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let bank = dir.path().join("broken.toml");
    std::fs::write(
        &bank,
        r#"
[bank]
id = "broken"
name = "Broken"

[[blocks]]
id = "num"
category = "num"
name = "Numérico"
default_quantity = 3

[[questions]]
id = "n1"
category = "num"
prompt = "2 + 2?"
format = "text"
options = ["3", "4"]
correct_answer = 5
"#,
    )
    .unwrap();

    psytest()
        .arg("validate")
        .arg("--bank")
        .arg(&bank)
        .assert()
        .success()
        .stdout(predicate::str::contains("[n1] WARNING"))
        .stdout(predicate::str::contains("[num] WARNING"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created psytest.toml"))
        .stdout(predicate::str::contains("Created banks/example.toml"));

    assert!(dir.path().join("psytest.toml").exists());
    assert!(dir.path().join("banks/example.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    psytest().current_dir(dir.path()).arg("init").assert().success();

    psytest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}

#[test]
fn import_then_list_tests() {
    let dir = imported_workspace();

    psytest()
        .current_dir(dir.path())
        .arg("tests")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulacro"))
        .stdout(predicate::str::contains("Repaso rápido"));

    assert!(dir.path().join("data/questions.json").exists());
}

#[test]
fn reimport_updates_in_place() {
    let dir = imported_workspace();

    psytest()
        .current_dir(dir.path())
        .args(["import", "--bank", "banks/example.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 created, 14 updated, 0 rejected"));
}

#[test]
fn import_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    psytest().current_dir(dir.path()).arg("init").assert().success();

    psytest()
        .current_dir(dir.path())
        .args(["import", "--bank", "banks/example.toml", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn take_unknown_test_fails() {
    let dir = imported_workspace();

    take(dir.path(), "nope", "q\n")
        .failure()
        .stderr(predicate::str::contains("cannot start test 'nope'"));
}

#[test]
fn completed_attempt_is_saved_and_listed() {
    let dir = imported_workspace();

    // four shuffled questions, all answered with the first option
    take(dir.path(), "repaso", "1\nn\n1\nn\n1\nn\n1\ns\n")
        .success()
        .stdout(predicate::str::contains("Attempt completed."))
        .stdout(predicate::str::contains("Saved as"));

    psytest()
        .current_dir(dir.path())
        .args(["results", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("repaso"))
        .stdout(predicate::str::contains("completed"));

    psytest()
        .current_dir(dir.path())
        .args(["results", "stats", "--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("**Attempts:** 1"));
}

#[test]
fn unanswered_submit_is_refused() {
    let dir = imported_workspace();

    take(dir.path(), "repaso", "s\nq\n")
        .success()
        .stdout(predicate::str::contains("unanswered"))
        .stdout(predicate::str::contains("Attempt abandoned"));
}

#[test]
fn quitting_saves_nothing() {
    let dir = imported_workspace();

    take(dir.path(), "simulacro", "1\nq\n")
        .success()
        .stdout(predicate::str::contains("Attempt abandoned"));

    psytest()
        .current_dir(dir.path())
        .args(["results", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results yet."));
}

#[test]
fn results_show_unknown_id_fails() {
    let dir = imported_workspace();

    psytest()
        .current_dir(dir.path())
        .args(["results", "show", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
