//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Workspace for one `rsgen` run: replay, config and output directory.
pub struct Fixture {
    pub temp_dir: TempDir,
    events: Vec<(String, String)>,
}

/// Files produced by a successful `generate` run.
#[derive(Debug)]
pub struct Generated {
    pub script: String,
    pub requirements: String,
    pub messages_dir: PathBuf,
    pub stdout: String,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            events: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Queue a `message` event carrying `body`.
    pub fn message(&mut self, body: Value) -> &mut Self {
        self.event("message", &json!({ "body": body }).to_string())
    }

    pub fn event(&mut self, name: &str, data: &str) -> &mut Self {
        self.events.push((name.to_string(), data.to_string()));
        self
    }

    pub fn write_replay(&self) -> PathBuf {
        let mut text = String::from(": recorded replay\n");
        for (name, data) in &self.events {
            text.push_str(&format!("event: {name}\n"));
            for line in data.lines() {
                text.push_str(&format!("data: {line}\n"));
            }
            text.push('\n');
        }
        let path = self.path().join("replay.sse");
        fs::write(&path, text).expect("write replay");
        path
    }

    pub fn write_config(&self, config: &Value) -> PathBuf {
        let path = self.path().join("config.json");
        fs::write(&path, serde_json::to_vec_pretty(config).expect("serialize config"))
            .expect("write config");
        path
    }

    /// Run `rsgen generate` against the queued replay.
    pub fn generate(&self, config: Option<&Path>) -> Output {
        let replay = self.write_replay();
        let mut cmd = Command::new(bin());
        cmd.arg("generate")
            .arg("--replay-file")
            .arg(&replay)
            .arg("--output-dir")
            .arg(self.output_dir())
            .env_remove("RUST_LOG")
            .stdin(Stdio::null());
        if let Some(config) = config {
            cmd.arg("--config-file").arg(config);
        }
        cmd.output().expect("run rsgen")
    }

    /// Run `generate` and collect its outputs, panicking on failure.
    pub fn generate_ok(&self, config: Option<&Path>) -> Generated {
        let output = self.generate(config);
        assert!(
            output.status.success(),
            "rsgen failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let out = self.output_dir();
        let script_path = fs::read_dir(&out)
            .expect("list output dir")
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("script-") && name.ends_with(".py"))
            })
            .expect("generated script");
        Generated {
            script: fs::read_to_string(script_path).expect("read script"),
            requirements: fs::read_to_string(out.join("requirements.txt"))
                .expect("read requirements"),
            messages_dir: out.join("messages"),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        }
    }
}

pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_rsgen")
}

/// Protobuf-JSON message body as the replay provider sends it.
pub fn wire_message(
    alias: &str,
    direction: &str,
    sequence: u64,
    timestamp: &str,
    message_type: &str,
    fields: Value,
) -> Value {
    json!({
        "parentEventId": { "id": "replay-root" },
        "metadata": {
            "id": {
                "connectionId": { "sessionAlias": alias },
                "direction": direction,
                "sequence": sequence.to_string()
            },
            "timestamp": timestamp,
            "messageType": message_type,
            "protocol": "FIX"
        },
        "fields": fields
    })
}

pub fn simple(value: &str) -> Value {
    json!({ "simpleValue": value })
}
