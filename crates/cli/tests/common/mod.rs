//! CLI command execution helpers for integration tests

use std::path::{Path, PathBuf};
use std::process::Command;

/// Result of one `keep` invocation
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs the `keep` binary inside a working directory
pub struct KeepCommand {
    working_dir: PathBuf,
}

impl KeepCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Execute and return the raw result
    pub fn execute(&self, args: &[&str]) -> CommandResult {
        let output = Command::new(env!("CARGO_BIN_EXE_keep"))
            .args(args)
            .current_dir(&self.working_dir)
            .env_remove("KEEP_LOG")
            .env_remove("FORCE_COLOR")
            .env_remove("CLICOLOR_FORCE")
            .output()
            .expect("failed to run keep binary");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    /// Execute and assert success
    pub fn ok(&self, args: &[&str]) -> CommandResult {
        let result = self.execute(args);
        assert!(
            result.success(),
            "keep {:?} failed (exit code {}):\nstdout: {}\nstderr: {}",
            args,
            result.exit_code,
            result.stdout,
            result.stderr
        );
        result
    }

    /// Execute and expect failure
    pub fn fails(&self, args: &[&str]) -> CommandResult {
        let result = self.execute(args);
        assert!(
            !result.success(),
            "keep {:?} should have failed:\nstdout: {}",
            args,
            result.stdout
        );
        result
    }

    /// Generations listed by `keep log --json`, newest first
    pub fn generations(&self) -> Vec<u64> {
        let result = self.ok(&["log", "--json"]);
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&result.stdout).expect("log --json is not valid JSON");
        entries
            .iter()
            .map(|e| e["generation"].as_u64().expect("generation is a number"))
            .collect()
    }
}
