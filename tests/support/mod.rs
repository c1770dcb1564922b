#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Isolated data directory for one test.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_file(&self, key: &str) -> PathBuf {
        self.dir.path().join(format!("{key}.json"))
    }

    pub fn write_file(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_store(&self, key: &str) -> Result<Value, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(self.store_file(key))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// `todo --dir <tempdir>` with environment overrides cleared.
    pub fn cmd(&self) -> Command {
        let mut cmd = todo_cmd();
        cmd.arg("--dir").arg(self.path());
        cmd
    }

    /// Run `todo add --json` and return the new task id.
    pub fn add(&self, args: &[&str]) -> Result<u64, Box<dyn std::error::Error>> {
        let output = self.cmd().arg("add").args(args).arg("--json").output()?;
        if !output.status.success() {
            return Err(format!("add failed: {}", String::from_utf8_lossy(&output.stderr)).into());
        }
        let value: Value = serde_json::from_slice(&output.stdout)?;
        value["data"]["task"]["id"]
            .as_u64()
            .ok_or_else(|| "missing task id".into())
    }

    pub fn list_json(&self, filter: &str) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self
            .cmd()
            .args(["list", "--filter", filter, "--json"])
            .output()?;
        if !output.status.success() {
            return Err(format!("list failed: {}", String::from_utf8_lossy(&output.stderr)).into());
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

pub fn todo_cmd() -> Command {
    let mut cmd = Command::cargo_bin("todo").expect("binary");
    cmd.env_remove("TODO_DIR").env_remove("RUST_LOG");
    cmd
}
