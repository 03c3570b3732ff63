//! Append-only commit journal using sled
//!
//! The journal is the writer side of the retention contract: it owns the
//! commits, calls `on_init` once when opened and `on_commit` after every
//! append, then deletes whatever the policy marked.

use crate::retention::RetentionPolicy;
use keeper_core::{CommitRecord, Error, Generation, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NEXT_GENERATION_KEY: &[u8] = b"next_generation";

/// Metadata stored for each commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub generation: Generation,
    /// Timestamp (Unix milliseconds)
    pub ts_unix_ms: u64,
    pub message: String,
}

impl CommitMeta {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Outcome of deleting the commits a policy marked
#[derive(Debug, Default)]
pub struct ReclaimReport {
    /// Commits physically deleted, oldest first
    pub deleted: Vec<Generation>,
    /// Per-commit failures; those commits stay in the catalog
    pub failed: Vec<Error>,
}

impl ReclaimReport {
    /// True when every marked commit was deleted
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every marked commit, isolating failures per commit
///
/// A failing deletion is logged and recorded; the remaining commits are
/// still processed.
pub fn reclaim<F>(commits: &[CommitRecord], mut delete: F) -> ReclaimReport
where
    F: FnMut(Generation) -> Result<()>,
{
    let mut report = ReclaimReport::default();

    for commit in commits.iter().filter(|c| c.is_deleted()) {
        let generation = commit.generation();
        match delete(generation) {
            Ok(()) => report.deleted.push(generation),
            Err(e) => {
                let err = match e {
                    err @ Error::DeletionRequest { .. } => err,
                    other => Error::DeletionRequest {
                        generation,
                        reason: other.to_string(),
                    },
                };
                warn!("{}", err);
                report.failed.push(err);
            }
        }
    }

    if !report.deleted.is_empty() || !report.failed.is_empty() {
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Reclaimed commits"
        );
    }
    report
}

/// Append-only journal of commits
pub struct Journal {
    /// Sled database
    db: Db,
    /// generation -> encoded CommitMeta
    commits: Tree,
    /// In-memory catalog
    index: RwLock<BTreeMap<Generation, CommitMeta>>,
    /// Next generation to assign; never reused, even after deletions
    next_generation: AtomicU64,
    /// Active retention policy
    policy: Arc<dyn RetentionPolicy>,
    /// Serializes appends and hook invocations
    writer: Mutex<()>,
    /// What `on_init` reclaimed when the journal was opened
    startup: ReclaimReport,
}

impl Journal {
    /// Open or create a journal in `dir` and reconcile it with `policy`
    ///
    /// `on_init` runs exactly once, before any new commit is accepted. If it
    /// fails, nothing is deleted and the error is returned.
    pub fn open(dir: &Path, policy: Arc<dyn RetentionPolicy>) -> Result<Self> {
        let db = sled::open(dir.join("commits.db"))?;
        let commits = db.open_tree("commits")?;

        // Build in-memory index on startup
        let mut index = BTreeMap::new();
        for item in commits.iter() {
            let (key, value) = item?;
            let generation = Generation::from_be_bytes(&key)?;
            index.insert(generation, CommitMeta::deserialize(&value)?);
        }

        let stored_next = match db.get(NEXT_GENERATION_KEY)? {
            Some(bytes) => Generation::from_be_bytes(&bytes)?,
            None => Generation::FIRST,
        };
        let after_last = index
            .keys()
            .next_back()
            .map(|g: &Generation| g.next())
            .unwrap_or(Generation::FIRST);
        let next_generation = stored_next.max(after_last);

        let mut journal = Self {
            db,
            commits,
            index: RwLock::new(index),
            next_generation: AtomicU64::new(next_generation.get()),
            policy,
            writer: Mutex::new(()),
            startup: ReclaimReport::default(),
        };

        let records = journal.records();
        debug!(commits = records.len(), "Running on_init");
        journal.policy.on_init(&records)?;
        journal.startup = journal.reclaim_marked(&records);

        info!(
            commits = journal.count(),
            next = %next_generation,
            "Journal opened"
        );
        Ok(journal)
    }

    /// Append a commit and apply retention
    ///
    /// The commit is durable before the policy runs. Hook or deletion
    /// failures are logged and never fail the commit.
    pub fn commit(&self, message: &str) -> Result<(CommitMeta, ReclaimReport)> {
        let _writer = self.writer.lock();

        let generation = Generation::new(self.next_generation.fetch_add(1, Ordering::SeqCst));
        let meta = CommitMeta {
            generation,
            ts_unix_ms: current_timestamp_ms(),
            message: message.to_string(),
        };

        self.commits
            .insert(generation.to_be_bytes(), meta.serialize()?)?;
        self.db
            .insert(NEXT_GENERATION_KEY, &generation.next().to_be_bytes()[..])?;

        // Flush to ensure durability
        self.db.flush()?;

        self.index.write().insert(generation, meta.clone());
        debug!(generation = %generation, "Commit appended");

        let records = self.records();
        let report = match self.policy.on_commit(&records) {
            Ok(()) => self.reclaim_marked(&records),
            Err(e) => {
                warn!(generation = %generation, "Retention hook failed, nothing reclaimed: {}", e);
                ReclaimReport::default()
            }
        };

        Ok((meta, report))
    }

    /// What was reclaimed when the journal was opened
    pub fn startup_report(&self) -> &ReclaimReport {
        &self.startup
    }

    /// Get a commit by generation
    pub fn get(&self, generation: Generation) -> Option<CommitMeta> {
        self.index.read().get(&generation).cloned()
    }

    /// Get the newest commit
    pub fn latest(&self) -> Option<CommitMeta> {
        self.index.read().values().next_back().cloned()
    }

    /// All commits, oldest first
    pub fn list(&self) -> Vec<CommitMeta> {
        self.index.read().values().cloned().collect()
    }

    /// All generations, oldest first
    pub fn generations(&self) -> Vec<Generation> {
        self.index.read().keys().copied().collect()
    }

    /// Get the total number of commits
    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    /// Fresh, unmarked records for every commit in the catalog
    fn records(&self) -> Vec<CommitRecord> {
        self.index
            .read()
            .keys()
            .map(|&g| CommitRecord::new(g))
            .collect()
    }

    fn reclaim_marked(&self, records: &[CommitRecord]) -> ReclaimReport {
        let report = reclaim(records, |generation| self.delete(generation));
        if !report.deleted.is_empty() {
            if let Err(e) = self.db.flush() {
                warn!("Failed to flush after reclaiming commits: {}", e);
            }
        }
        report
    }

    /// Physically delete one commit
    fn delete(&self, generation: Generation) -> Result<()> {
        self.commits.remove(generation.to_be_bytes())?;
        self.index.write().remove(&generation);
        Ok(())
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::PinStore;
    use crate::retention::{KeepAll, KeepLastN, KeepOnlyLast};
    use crate::snapshot::SnapshotGuard;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn gens(values: &[u64]) -> Vec<Generation> {
        values.iter().copied().map(Generation::new).collect()
    }

    /// Accepts startup but rejects every commit hook
    struct RejectCommits;

    impl RetentionPolicy for RejectCommits {
        fn on_init(&self, _commits: &[CommitRecord]) -> Result<()> {
            Ok(())
        }

        fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
            // Marks first, then fails: nothing marked may be reclaimed
            for c in commits {
                c.delete();
            }
            Err(Error::Configuration("policy unavailable".into()))
        }
    }

    #[test]
    fn test_reclaim_isolates_failures() {
        let records: Vec<_> = (1..=5).map(|g| CommitRecord::new(Generation::new(g))).collect();
        for r in &records[..4] {
            r.delete();
        }

        let mut attempted = Vec::new();
        let report = reclaim(&records, |generation| {
            attempted.push(generation);
            if generation == Generation::new(2) {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
            } else {
                Ok(())
            }
        });

        assert_eq!(attempted, gens(&[1, 2, 3, 4]));
        assert_eq!(report.deleted, gens(&[1, 3, 4]));
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
        match &report.failed[0] {
            Error::DeletionRequest { generation, reason } => {
                assert_eq!(*generation, Generation::new(2));
                assert!(reason.contains("read-only"));
            }
            other => panic!("expected DeletionRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_deletion_is_retried_on_next_hook() {
        let mut catalog: BTreeSet<Generation> = gens(&[1, 2, 3]).into_iter().collect();
        let policy = KeepOnlyLast;

        let first: Vec<_> = catalog.iter().map(|&g| CommitRecord::new(g)).collect();
        policy.on_commit(&first).unwrap();
        let report = reclaim(&first, |generation| {
            if generation == Generation::new(2) {
                return Err(Error::Configuration("disk busy".into()));
            }
            catalog.remove(&generation);
            Ok(())
        });
        assert_eq!(report.deleted, gens(&[1]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(catalog.iter().copied().collect::<Vec<_>>(), gens(&[2, 3]));

        // Fresh records from what survived: the failed commit is marked again
        let second: Vec<_> = catalog.iter().map(|&g| CommitRecord::new(g)).collect();
        policy.on_commit(&second).unwrap();
        let report = reclaim(&second, |generation| {
            catalog.remove(&generation);
            Ok(())
        });
        assert_eq!(report.deleted, gens(&[2]));
        assert!(report.is_clean());
        assert_eq!(catalog.into_iter().collect::<Vec<_>>(), gens(&[3]));
    }

    #[test]
    fn test_commit_survives_hook_failure() {
        let temp_dir = TempDir::new().unwrap();

        {
            let journal = Journal::open(temp_dir.path(), Arc::new(RejectCommits)).unwrap();
            let (first, report) = journal.commit("one").unwrap();
            assert!(report.is_clean());
            assert!(report.deleted.is_empty());

            let (second, report) = journal.commit("two").unwrap();
            assert!(report.deleted.is_empty());
            assert_eq!(journal.get(first.generation), Some(first));
            assert_eq!(journal.get(second.generation), Some(second));
        }

        let journal = Journal::open(temp_dir.path(), Arc::new(KeepAll)).unwrap();
        assert_eq!(journal.generations(), gens(&[1, 2]));
        assert_eq!(journal.latest().unwrap().message, "two");
    }

    #[test]
    fn test_snapshot_after_commit_reclaimed_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let guard = Arc::new(SnapshotGuard::new(KeepLastN::new(0)));
        let journal = Journal::open(temp_dir.path(), guard.clone()).unwrap();

        let (meta, report) = journal.commit("gone").unwrap();
        assert_eq!(report.deleted, vec![meta.generation]);
        assert_eq!(journal.count(), 0);
        assert!(matches!(guard.snapshot(), Err(Error::NoCommitsYet)));
    }

    #[test]
    fn test_commit_applies_policy() {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::open(temp_dir.path(), Arc::new(KeepLastN::new(2))).unwrap();

        for i in 1..=5 {
            journal.commit(&format!("commit {}", i)).unwrap();
        }

        assert_eq!(journal.generations(), gens(&[4, 5]));
        assert_eq!(journal.latest().unwrap().message, "commit 5");
    }

    #[test]
    fn test_commit_reports_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::open(temp_dir.path(), Arc::new(KeepOnlyLast)).unwrap();

        let (first, report) = journal.commit("first").unwrap();
        assert_eq!(first.generation, Generation::FIRST);
        assert!(report.deleted.is_empty());

        let (second, report) = journal.commit("second").unwrap();
        assert_eq!(second.generation, Generation::new(2));
        assert_eq!(report.deleted, gens(&[1]));
        assert!(journal.get(Generation::FIRST).is_none());
    }

    #[test]
    fn test_reopen_with_stricter_policy() {
        let temp_dir = TempDir::new().unwrap();

        {
            let journal = Journal::open(temp_dir.path(), Arc::new(KeepAll)).unwrap();
            for i in 1..=10 {
                journal.commit(&format!("c{}", i)).unwrap();
            }
            assert_eq!(journal.count(), 10);
        }

        let journal = Journal::open(temp_dir.path(), Arc::new(KeepLastN::new(3))).unwrap();
        assert_eq!(journal.startup_report().deleted, gens(&[1, 2, 3, 4, 5, 6, 7]));
        assert_eq!(journal.generations(), gens(&[8, 9, 10]));
    }

    #[test]
    fn test_generations_never_reused() {
        let temp_dir = TempDir::new().unwrap();

        {
            let journal = Journal::open(temp_dir.path(), Arc::new(KeepLastN::new(0))).unwrap();
            journal.commit("a").unwrap();
            journal.commit("b").unwrap();
            assert_eq!(journal.count(), 0);
        }

        let journal = Journal::open(temp_dir.path(), Arc::new(KeepAll)).unwrap();
        let (meta, _) = journal.commit("c").unwrap();
        assert_eq!(meta.generation, Generation::new(3));
    }

    #[test]
    fn test_snapshot_protects_through_journal() {
        let temp_dir = TempDir::new().unwrap();
        let guard = Arc::new(SnapshotGuard::new(KeepOnlyLast));
        let journal = Journal::open(temp_dir.path(), guard.clone()).unwrap();

        journal.commit("one").unwrap();
        let handle = guard.snapshot().unwrap();
        journal.commit("two").unwrap();
        journal.commit("three").unwrap();
        assert_eq!(journal.generations(), gens(&[1, 3]));

        guard.release(&handle).unwrap();
        assert_eq!(journal.generations(), gens(&[1, 3]));

        journal.commit("four").unwrap();
        assert_eq!(journal.generations(), gens(&[4]));
    }

    #[test]
    fn test_durable_snapshot_survives_crash() {
        let temp_dir = TempDir::new().unwrap();

        let handle = {
            let store = PinStore::open(temp_dir.path()).unwrap();
            let guard = Arc::new(SnapshotGuard::durable(KeepOnlyLast, store).unwrap());
            let journal = Journal::open(temp_dir.path(), guard.clone()).unwrap();
            journal.commit("one").unwrap();
            journal.commit("two").unwrap();
            let handle = guard.snapshot().unwrap();
            journal.commit("three").unwrap();
            handle
        };
        assert_eq!(handle.generation, Generation::new(2));

        let store = PinStore::open(temp_dir.path()).unwrap();
        let guard = Arc::new(SnapshotGuard::durable(KeepOnlyLast, store).unwrap());
        let journal = Journal::open(temp_dir.path(), guard.clone()).unwrap();
        assert_eq!(journal.generations(), gens(&[2, 3]));

        guard.release(&handle).unwrap();
        journal.commit("four").unwrap();
        assert_eq!(journal.generations(), gens(&[4]));
    }
}
