#![allow(deprecated)]
//! Black-box tests of the `mariadb-rotate` binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::tempdir;

const HOST: &str = "db1.abc.us-east-1.rds.amazonaws.com";

fn mariadb_rotate() -> Command {
    let mut cmd = Command::cargo_bin("mariadb-rotate").expect("binary built");
    for var in [
        "ROTATION_CONFIG",
        "ROTATION_LOG_JSON",
        "EXCLUDE_CHARACTERS",
        "SECRETS_MANAGER_ENDPOINT",
        "ROTATION_CONNECT_TIMEOUT_SECS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn version(payload: &Value, stage: &str) -> Value {
    json!({
        "secret_string": payload.to_string(),
        "stages": [stage],
        "created_at": "2026-01-01T00:00:00Z",
    })
}

fn write_state(path: &Path) {
    let master = json!({
        "engine": "mariadb", "host": HOST, "username": "admin", "password": "root-pw",
    });
    let app = json!({
        "engine": "mariadb", "host": HOST, "username": "app_user", "password": "app-pw",
        "dbname": "orders", "masterarn": "app/master",
    });
    let state = json!({
        "secrets": { "secrets": {
            "app/master": { "versions": { "m1": version(&master, "AWSCURRENT") } },
            "app/db": { "versions": { "a1": version(&app, "AWSCURRENT") } },
        }},
        "database": { "servers": { HOST: { "users": {
            "admin": {
                "password": "root-pw",
                "grants": ["GRANT ALL PRIVILEGES ON *.*"],
                "can_grant": true,
            },
            "app_user": {
                "password": "app-pw",
                "grants": ["GRANT USAGE ON *.*", "GRANT SELECT ON `orders`.*"],
            },
        }}}},
    });
    fs::write(path, state.to_string()).expect("write state");
}

fn read_state(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read state")).expect("state json")
}

#[test]
fn alternate_appends_and_strips_suffix() {
    mariadb_rotate()
        .args(["alternate", "app_user"])
        .assert()
        .success()
        .stdout("app_user_clone\n");

    mariadb_rotate()
        .args(["alternate", "app_user_clone"])
        .assert()
        .success()
        .stdout("app_user\n");
}

#[test]
fn alternate_rejects_overlong_name() {
    mariadb_rotate()
        .args(["alternate", &"u".repeat(78)])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn validate_redacts_password() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("secret.json");
    fs::write(
        &file,
        r#"{"engine":"mariadb","host":"db1","username":"app","password":"hunter2","port":"3307"}"#,
    )
    .expect("write");

    mariadb_rotate()
        .args(["--format", "json", "validate"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"port\": 3307"))
        .stdout(predicate::str::contains("[REDACTED]"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn validate_rejects_wrong_engine() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("secret.json");
    fs::write(
        &file,
        r#"{"engine":"postgres","host":"db1","username":"app","password":"pw"}"#,
    )
    .expect("write");

    mariadb_rotate()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("mariadb"));
}

#[test]
fn rotate_runs_all_steps_and_persists_state() {
    let dir = tempdir().expect("tempdir");
    let state = dir.path().join("state.json");
    write_state(&state);

    let output = mariadb_rotate()
        .args(["--format", "json", "rotate", "--secret-id", "app/db", "--state"])
        .arg(&state)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("report json");
    let outcomes: Vec<&str> = report["steps"]
        .as_array()
        .expect("steps")
        .iter()
        .map(|step| step["outcome"].as_str().expect("outcome"))
        .collect();
    assert_eq!(outcomes, ["created", "password_set", "tested", "promoted"]);

    let token = report["token"].as_str().expect("token");
    let saved = read_state(&state);
    let versions = &saved["secrets"]["secrets"]["app/db"]["versions"];
    assert_eq!(versions[token]["stages"], json!(["AWSCURRENT"]));
    assert_eq!(versions["a1"]["stages"], json!(["AWSPREVIOUS"]));
    assert!(
        saved["database"]["servers"][HOST]["users"]
            .get("app_user_clone")
            .is_some()
    );
}

#[test]
fn rotate_uses_configured_password_length() {
    let dir = tempdir().expect("tempdir");
    let state = dir.path().join("state.json");
    let config = dir.path().join("rotation.toml");
    write_state(&state);
    fs::write(&config, "password_length = 40\n").expect("write config");

    mariadb_rotate()
        .arg("--config")
        .arg(&config)
        .args(["rotate", "--secret-id", "app/db", "--state"])
        .arg(&state)
        .assert()
        .success();

    let saved = read_state(&state);
    let password = saved["database"]["servers"][HOST]["users"]["app_user_clone"]["password"]
        .as_str()
        .expect("clone password");
    assert_eq!(password.chars().count(), 40);
}

#[test]
fn step_is_idempotent_for_a_promoted_token() {
    let dir = tempdir().expect("tempdir");
    let state = dir.path().join("state.json");
    write_state(&state);

    mariadb_rotate()
        .args([
            "step",
            "--secret-id",
            "app/db",
            "--token",
            "a1",
            "--step",
            "createSecret",
            "--state",
        ])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("version already current"));
}

#[test]
fn step_with_unknown_token_fails() {
    let dir = tempdir().expect("tempdir");
    let state = dir.path().join("state.json");
    write_state(&state);

    mariadb_rotate()
        .args([
            "step",
            "--secret-id",
            "app/db",
            "--token",
            "nope",
            "--step",
            "createSecret",
            "--state",
        ])
        .arg(&state)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn invalid_config_file_fails() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("rotation.toml");
    fs::write(&config, "connect_timeout_secs = 0\n").expect("write");

    mariadb_rotate()
        .arg("--config")
        .arg(&config)
        .args(["alternate", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("connect_timeout_secs"));
}
