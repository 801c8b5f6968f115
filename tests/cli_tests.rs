use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const CUSTOMER: &str = "6f1c2a9e-3b4d-4c5e-8f70-112233445566";
const PAYMENT: &str = "0b7e4d2c-1a2b-4c3d-9e8f-aabbccddeeff";

fn billing_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("billing"));
    cmd.env_remove("BILLING_URL")
        .env_remove("BILLING_API_KEY")
        .env_remove("BILLING_ACTOR")
        .env_remove("RUST_LOG");
    cmd
}

/// Initialized config dir pointing at a port nothing listens on
fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("billing-config");

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "init"])
        .assert()
        .success();
    point_at(&config_path, "http://127.0.0.1:9");

    (temp_dir, config_path)
}

fn point_at(config_path: &Path, url: &str) {
    let config = config_path.join("config.toml");
    let content = fs::read_to_string(&config).unwrap();
    let content = content.replace("https://your-project.example.com", url);
    fs::write(&config, content).unwrap();
}

#[test]
fn test_help() {
    billing_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("payments, allocations and cash settlements"));
}

#[test]
fn test_version() {
    billing_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("billing"));
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("billing-config");

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized billing config"));

    let content = fs::read_to_string(config_path.join("config.toml")).unwrap();
    assert!(content.contains("[backend]"));
    assert!(content.contains("currency_symbol"));
}

#[test]
fn test_init_fails_if_exists() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("billing-config");

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "init"])
        .assert()
        .success();

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_status_without_init() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nonexistent");

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_status_shows_operator_and_env_override() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:9"))
        .stdout(predicate::str::contains("changes will be refused"));

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "--as", "alice", "status"])
        .env("BILLING_URL", "https://billing.internal.test")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://billing.internal.test"))
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn test_allocate_without_lines() {
    billing_cmd()
        .args(["allocate", PAYMENT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("At least one allocation required"));
}

#[test]
fn test_pay_zero_amount() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "--as",
            "alice",
            "pay",
            "--customer",
            CUSTOMER,
            "--amount",
            "0",
            "--method",
            "cash",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Payment amount must be greater than zero"));
}

#[test]
fn test_pay_rejects_unknown_method() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "--as",
            "alice",
            "pay",
            "--customer",
            CUSTOMER,
            "--amount",
            "10",
            "--method",
            "barter",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("barter"));
}

#[test]
fn test_pay_bad_line_format() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "--as",
            "alice",
            "pay",
            "--customer",
            CUSTOMER,
            "--amount",
            "100",
            "--method",
            "transfer",
            "--line",
            "F-2026-0001",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid allocation format"));
}

#[test]
fn test_pay_without_identity() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "pay",
            "--customer",
            CUSTOMER,
            "--amount",
            "100",
            "--method",
            "transfer",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No operator identity"));
}

#[test]
fn test_unreachable_backend() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "dossiers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backend request failed"));
}

#[test]
fn test_invalid_ids_and_dates() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args(["-C", config_path.to_str().unwrap(), "allocations", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not-a-uuid"));

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "--as",
            "alice",
            "cash",
            "add",
            "D-1",
            "--amount",
            "20",
            "--date",
            "19/10/2026",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected YYYY-MM-DD"));
}

#[test]
fn test_mode_rejects_unknown_value() {
    let (_temp_dir, config_path) = setup();

    billing_cmd()
        .args([
            "-C",
            config_path.to_str().unwrap(),
            "--as",
            "alice",
            "mode",
            "D-1",
            "--set",
            "sometimes",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sometimes"));
}

#[test]
fn test_pay_help_lists_defer() {
    billing_cmd()
        .args(["pay", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--defer"))
        .stdout(predicate::str::contains("allocate later"));
}

#[test]
fn test_pay_defer_conflicts_with_lines() {
    billing_cmd()
        .args([
            "pay",
            "--customer",
            CUSTOMER,
            "--amount",
            "100",
            "--method",
            "transfer",
            "--defer",
            "--line",
            "F-2026-0001:60",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
