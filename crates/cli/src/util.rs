//! Shared utilities for CLI commands

use crate::config::{self, KeepConfig};
use anyhow::{Context, Result};
use journal::{CommitMeta, Journal, PinStore, RetentionPolicy, SnapshotGuard};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the repository metadata directory
pub const KEEP_DIR: &str = ".keep";

/// Snapshot guard over the configured base policy
pub type Guard = SnapshotGuard<Box<dyn RetentionPolicy>>;

/// An opened repository: configuration, snapshot guard and journal
pub struct Repo {
    pub root: PathBuf,
    pub config: KeepConfig,
    pub guard: Arc<Guard>,
    pub journal: Journal,
}

impl Repo {
    /// Find and open the repository containing the current directory
    ///
    /// Opening runs `on_init`, so retention is re-applied every time.
    pub fn open() -> Result<Self> {
        let root = find_repo_root().context("Failed to find repository")?;
        let keep_dir = root.join(KEEP_DIR);
        let config = config::load(&keep_dir)?;

        let policy = config
            .build_policy()
            .context("Failed to build retention policy")?;

        let journal_dir = keep_dir.join("journal");
        let guard = if config.snapshots.durable {
            let store = PinStore::open(&journal_dir).context("Failed to open snapshot store")?;
            SnapshotGuard::durable(policy, store).context("Failed to restore snapshots")?
        } else {
            SnapshotGuard::new(policy)
        };
        let guard = Arc::new(guard);

        let journal = Journal::open(&journal_dir, guard.clone())
            .context("Failed to open commit journal")?;

        Ok(Self {
            root,
            config,
            guard,
            journal,
        })
    }

    pub fn keep_dir(&self) -> PathBuf {
        self.root.join(KEEP_DIR)
    }
}

/// Find repository root by walking up from cwd to find .keep/
pub fn find_repo_root() -> Result<PathBuf> {
    let mut current = std::env::current_dir().context("Failed to get current directory")?;

    loop {
        let keep_dir = current.join(KEEP_DIR);
        if keep_dir.is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!("Not a keeper repository (no .keep directory found)"),
        }
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    let datetime = UNIX_EPOCH + Duration::from_millis(ts_ms);

    if let Ok(elapsed) = SystemTime::now().duration_since(datetime) {
        let seconds = elapsed.as_secs();

        if seconds < 60 {
            format!("{} seconds ago", seconds)
        } else if seconds < 3600 {
            format!("{} minutes ago", seconds / 60)
        } else if seconds < 86400 {
            format!("{} hours ago", seconds / 3600)
        } else if seconds < 604800 {
            format!("{} days ago", seconds / 86400)
        } else {
            format!("{} weeks ago", seconds / 604800)
        }
    } else {
        "in the future".to_string()
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Print one commit on a single line
pub fn display_commit(meta: &CommitMeta, pins: usize) {
    let pin_note = if pins > 0 {
        format!(" [pinned x{}]", pins)
    } else {
        String::new()
    };

    println!(
        "{} {} {}{}",
        format!("#{}", meta.generation).if_supports_color(Stdout, |t| t.yellow()),
        format_relative_time(meta.ts_unix_ms).if_supports_color(Stdout, |t| t.dimmed()),
        meta.message,
        pin_note.if_supports_color(Stdout, |t| t.cyan())
    );
}

/// Calculate directory size recursively
pub fn calculate_dir_size(dir: &Path) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut total = 0u64;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            total += entry.metadata()?.len();
        } else if path.is_dir() {
            total += calculate_dir_size(&path)?;
        }
    }

    Ok(total)
}
