//! Tests for creating and checking identities from the command line

use std::process::Command;

use authlink_crypto::AuthBundle;

fn authlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_authlink"));
    cmd.env_remove("AUTHLINK_URL")
        .env_remove("AUTHLINK_AUTH_URL")
        .env_remove("AUTHLINK_PASSWORD");
    cmd
}

#[test]
fn test_init_prints_a_usable_bundle() {
    let output = authlink()
        .args(["init", "--password", "hunter2"])
        .output()
        .expect("Failed to execute authlink command");

    assert!(output.status.success(), "Command should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let bundle = AuthBundle::from_json(&stdout).expect("stdout is a bundle");
    bundle
        .derive_keys("hunter2")
        .expect("the password unlocks the new bundle");
}

#[test]
fn test_init_writes_bundle_file() {
    let path = std::env::temp_dir().join(format!("authlink-init-{}.json", std::process::id()));

    let output = authlink()
        .args(["init", "--password", "hunter2", "--out"])
        .arg(&path)
        .output()
        .expect("Failed to execute authlink command");
    assert!(output.status.success(), "Command should exit successfully");

    let json = std::fs::read_to_string(&path).expect("bundle file written");
    std::fs::remove_file(&path).expect("cleanup");
    assert!(AuthBundle::from_json(&json).is_ok(), "Invalid bundle: {}", json);
}

#[test]
fn test_check_requires_auth_url() {
    let output = authlink()
        .args(["check", "--password", "hunter2"])
        .output()
        .expect("Failed to execute authlink command");

    assert!(!output.status.success(), "Command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("AUTHLINK_AUTH_URL"),
        "Error should name the missing setting: {}",
        stderr
    );
}
