use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/dre.json")
}

fn painel(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("painel").unwrap();
    cmd.env("PAINEL_CONFIG_DIR", config.path())
        .env_remove("PAINEL_API_URL")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn dre_from_file_prints_groups_and_margin() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["dre", "--text", "--year", "2024", "--months", "1", "--expand-all", "--input"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("DRE - Realizada"))
        .stdout(predicate::str::contains("1.0 - RECEITA BRUTA"))
        .stdout(predicate::str::contains("SALÁRIOS - 18"))
        .stdout(predicate::str::contains("-22.513"))
        .stdout(predicate::str::contains("4.1 - MARGEM %"))
        .stdout(predicate::str::contains("40.0%"));
}

#[test]
fn dre_collapsed_hides_line_items() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["dre", "--text", "--year", "2024", "--input"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("7.0 - DESPESAS"))
        .stdout(predicate::str::contains("SALÁRIOS - 18").not());
}

#[test]
fn dre_rejects_out_of_range_month() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["dre", "--text", "--months", "13", "--input"])
        .arg(fixture())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid month"));
}

#[test]
fn dre_without_organization_fails() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["dre", "--text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No organization selected"));
}

#[test]
fn dre_with_malformed_file_renders_empty() {
    let config = TempDir::new().unwrap();
    let bad = config.path().join("bad.json");
    std::fs::write(&bad, "not json").unwrap();
    painel(&config)
        .args(["dre", "--text", "--input"])
        .arg(&bad)
        .assert()
        .success()
        .stdout(predicate::str::contains("No DRE data found."));
}

#[test]
fn session_set_then_show_masks_token() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["session", "set", "--token", "abcdef123456", "--org", "5", "--org-name", "Matriz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session saved."));

    painel(&config)
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3456"))
        .stdout(predicate::str::contains("abcdef").not())
        .stdout(predicate::str::contains("5 (Matriz)"));
}

#[test]
fn session_use_org_requires_token() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["session", "use-org", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not authenticated"));
}

#[test]
fn session_clear_removes_stored_state() {
    let config = TempDir::new().unwrap();
    painel(&config)
        .args(["session", "set", "--token", "tok-0001", "--org", "1"])
        .assert()
        .success();
    painel(&config)
        .args(["session", "clear"])
        .assert()
        .success();
    painel(&config)
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(none)"));
}
