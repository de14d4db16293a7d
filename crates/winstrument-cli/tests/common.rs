//! Common test utilities shared across integration tests.
//!
//! Clippy cannot track usage across integration test files, hence the
//! `allow(dead_code)` annotation.
#![cfg(test)]
#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestFixture {
    temp_dir: TempDir,
    data_dir: PathBuf,
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join(".winstrument");
        fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        Self { temp_dir, data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn recording(&self, name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Non-interactive stdin, so `run` never prompts.
    pub fn command(&self) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("winstrument");
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .arg("--log-level")
            .arg("warn")
            .env_remove("RUST_LOG")
            .write_stdin("");
        cmd
    }

    pub fn run_app(&self, probes: &[&str]) -> anyhow::Result<()> {
        let mut cmd = self.command();
        cmd.arg("run").arg("--replay").arg(self.recording("app.json"));
        for probe in probes {
            cmd.arg("--probe").arg(probe);
        }
        let output = cmd.arg("C:\\Tools\\app.exe").output()?;

        if !output.status.success() {
            anyhow::bail!(
                "run failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}
