//! Retention policies deciding which commits may be reclaimed

use keeper_core::{check_ordered, CommitRecord, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides, from the ordered commit list, which commits to mark for deletion
///
/// Commits arrive oldest first. A policy only classifies: it calls
/// [`CommitRecord::delete`] and leaves physical deletion to the writer.
pub trait RetentionPolicy: Send + Sync {
    /// Called once at startup with every commit found on disk.
    ///
    /// Applies the same rules as [`RetentionPolicy::on_commit`] so a policy
    /// that changed since the commits were written takes effect immediately.
    fn on_init(&self, commits: &[CommitRecord]) -> Result<()> {
        self.on_commit(commits)
    }

    /// Called after every successful commit with the full, up to date list
    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()>;
}

impl<P: RetentionPolicy + ?Sized> RetentionPolicy for Box<P> {
    fn on_init(&self, commits: &[CommitRecord]) -> Result<()> {
        (**self).on_init(commits)
    }

    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        (**self).on_commit(commits)
    }
}

impl<P: RetentionPolicy + ?Sized> RetentionPolicy for Arc<P> {
    fn on_init(&self, commits: &[CommitRecord]) -> Result<()> {
        (**self).on_init(commits)
    }

    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        (**self).on_commit(commits)
    }
}

/// Keep the newest `n` commits, mark everything older
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepLastN {
    n: usize,
}

impl KeepLastN {
    /// Smallest value that always leaves a readable commit behind
    pub const RECOMMENDED_MIN: usize = 1;

    /// Create the policy. `n = 0` is accepted but leaves no commit on disk.
    pub fn new(n: usize) -> Self {
        if n < Self::RECOMMENDED_MIN {
            warn!("KeepLastN(0) retains no commits; the store may become unreadable");
        }
        Self { n }
    }

    /// Number of commits retained
    pub fn retained(&self) -> usize {
        self.n
    }
}

impl TryFrom<i64> for KeepLastN {
    type Error = Error;

    fn try_from(n: i64) -> Result<Self> {
        let n = usize::try_from(n).map_err(|_| {
            Error::Configuration(format!("commits to keep must be >= 0, got {}", n))
        })?;
        Ok(Self::new(n))
    }
}

impl RetentionPolicy for KeepLastN {
    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        check_ordered(commits)?;

        let cutoff = commits.len().saturating_sub(self.n);
        for commit in &commits[..cutoff] {
            commit.delete();
        }

        debug!(
            total = commits.len(),
            keep = self.n,
            marked = cutoff,
            "KeepLastN applied"
        );
        Ok(())
    }
}

/// Keep only the newest commit; same as `KeepLastN(1)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepOnlyLast;

impl RetentionPolicy for KeepOnlyLast {
    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        KeepLastN { n: 1 }.on_commit(commits)
    }
}

/// Never marks anything. Used as the base when only snapshots should drive retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAll;

impl RetentionPolicy for KeepAll {
    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        check_ordered(commits)?;
        debug!(total = commits.len(), "KeepAll applied, nothing marked");
        Ok(())
    }
}

/// Retention variant selected in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    KeepOnlyLast,
    KeepLastN,
    KeepAll,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PolicyKind::KeepOnlyLast => "keep_only_last",
            PolicyKind::KeepLastN => "keep_last_n",
            PolicyKind::KeepAll => "keep_all",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep_only_last" => Ok(PolicyKind::KeepOnlyLast),
            "keep_last_n" => Ok(PolicyKind::KeepLastN),
            "keep_all" => Ok(PolicyKind::KeepAll),
            other => Err(Error::Configuration(format!(
                "unknown retention policy '{}' (expected keep_only_last, keep_last_n or keep_all)",
                other
            ))),
        }
    }
}

/// Build a policy from configuration. `keep` is only read for `KeepLastN`.
pub fn build_policy(kind: PolicyKind, keep: i64) -> Result<Box<dyn RetentionPolicy>> {
    let policy: Box<dyn RetentionPolicy> = match kind {
        PolicyKind::KeepOnlyLast => Box::new(KeepOnlyLast),
        PolicyKind::KeepLastN => Box::new(KeepLastN::try_from(keep)?),
        PolicyKind::KeepAll => Box::new(KeepAll),
    };
    Ok(policy)
}
