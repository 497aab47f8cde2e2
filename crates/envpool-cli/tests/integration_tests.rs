use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("envpool").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("envpool - asynchronous environment pool"));
}

#[test]
fn test_cli_list() {
    let mut cmd = Command::cargo_bin("envpool").unwrap();
    cmd.arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available environments:"))
        .stdout(predicate::str::contains("catch"))
        .stdout(predicate::str::contains("cartpole"))
        .stdout(predicate::str::contains("bandit"));
}

#[test]
fn test_cli_bench_json() {
    let mut cmd = Command::cargo_bin("envpool").unwrap();
    let output = cmd
        .args(["bench", "cartpole", "--num-envs", "4", "--num-threads", "2"])
        .args(["--batch-size", "2", "--steps", "200", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["steps"].as_u64().unwrap() >= 200);
    assert_eq!(report["batch_size"], 2);
    assert_eq!(report["config"]["num_envs"], 4);
    assert_eq!(report["faults"], 0);
    assert!(report["steps_per_sec"].as_f64().unwrap() > 0.0);
    assert_eq!(report["version"], envpool::VERSION);
}

#[test]
fn test_cli_demo() {
    let mut cmd = Command::cargo_bin("envpool").unwrap();
    cmd.args(["demo", "catch", "--steps", "25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Step 0: env=0"))
        .stdout(predicate::str::contains("done=true"));
}

#[test]
fn test_cli_unknown_env_fails() {
    let mut cmd = Command::cargo_bin("envpool").unwrap();
    cmd.args(["bench", "pong", "--steps", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown environment 'pong'"));
}
