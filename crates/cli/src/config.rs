//! Repository configuration (`.keep/config.toml`)

use anyhow::{Context, Result};
use journal::{build_policy, Error, PolicyKind, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepConfig {
    pub retention: RetentionConfig,
    pub snapshots: SnapshotConfig,
}

/// Which commits survive after each commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub policy: PolicyKind,
    /// Commits to keep; read by `keep_last_n` only
    pub keep: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::KeepOnlyLast,
            keep: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Persist snapshots so they survive restarts and crashes
    pub durable: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { durable: true }
    }
}

impl KeepConfig {
    /// Reject values that cannot build a policy
    pub fn validate(&self) -> journal::Result<()> {
        if self.retention.keep < 0 {
            return Err(Error::Configuration(format!(
                "retention.keep must be >= 0, got {}",
                self.retention.keep
            )));
        }
        Ok(())
    }

    /// Build the configured base policy
    pub fn build_policy(&self) -> journal::Result<Box<dyn RetentionPolicy>> {
        self.validate()?;
        build_policy(self.retention.policy, self.retention.keep)
    }
}

/// Path of the config file inside a `.keep` directory
pub fn config_file_path(keep_dir: &Path) -> PathBuf {
    keep_dir.join("config.toml")
}

/// Load configuration, falling back to defaults when the file is missing
pub fn load(keep_dir: &Path) -> Result<KeepConfig> {
    let path = config_file_path(keep_dir);
    if !path.exists() {
        return Ok(KeepConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: KeepConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Validate and write configuration
pub fn save(keep_dir: &Path, config: &KeepConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let contents = toml::to_string_pretty(config)
        .context("Failed to serialize configuration")?;
    std::fs::write(config_file_path(keep_dir), contents)
        .context("Failed to write config file")?;
    Ok(())
}
