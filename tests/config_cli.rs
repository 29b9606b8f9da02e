mod common;

use common::{bin, Fixture};
use serde_json::{json, Value};
use std::process::Command;

#[test]
fn config_stub_is_a_valid_config() {
    let output = Command::new(bin())
        .arg("config-stub")
        .output()
        .expect("run config-stub");
    assert!(output.status.success());
    let stub: Value = serde_json::from_slice(&output.stdout).expect("stub json");
    assert_eq!(stub["actions"]["send-message"]["direction"], json!("SECOND"));
    assert!(stub["actions"]["check-response"].is_object());

    let fixture = Fixture::new();
    let path = fixture.write_config(&stub);
    let status = Command::new(bin())
        .arg("validate-config")
        .arg("--config-file")
        .arg(&path)
        .status()
        .expect("run validate-config");
    assert!(status.success());
}

#[test]
fn empty_transformation_is_reported() {
    let fixture = Fixture::new();
    let path = fixture.write_config(&json!({ "transform": { "FIX": { "Logon": [] } } }));
    let output = Command::new(bin())
        .arg("validate-config")
        .arg("--config-file")
        .arg(&path)
        .output()
        .expect("run validate-config");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("Empty transformation for FIX message: Logon"));
}

#[test]
fn bad_action_settings_abort_generation() {
    let mut fixture = Fixture::new();
    fixture.event("close", "");
    let config = fixture.write_config(&json!({
        "actions": { "send-message": { "message-types": ["("] } }
    }));
    let output = fixture.generate(Some(&config));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load 'send-message' action settings"), "{stderr}");
    assert!(!fixture.output_dir().exists());
}
