//! Snapshot guard: pins commits against deletion on top of any retention policy

use crate::pins::PinStore;
use crate::retention::RetentionPolicy;
use ahash::AHashMap;
use keeper_core::{check_ordered, CommitRecord, Error, Generation, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Receipt returned by [`SnapshotGuard::snapshot`], presented again to release
///
/// Every call yields a distinct id, even when several handles pin the
/// same generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHandle {
    pub id: Ulid,
    pub generation: Generation,
}

/// Everything guarded by the single lock
#[derive(Default)]
struct PinState {
    /// Newest generation seen by a hook
    latest: Option<Generation>,
    /// generation -> number of outstanding handles
    refs: BTreeMap<Generation, usize>,
    /// Outstanding handles
    handles: AHashMap<Ulid, Generation>,
}

impl PinState {
    fn pin(&mut self, handle: SnapshotHandle) {
        self.handles.insert(handle.id, handle.generation);
        *self.refs.entry(handle.generation).or_insert(0) += 1;
    }

    /// Returns false when the handle was not outstanding
    fn unpin(&mut self, handle: &SnapshotHandle) -> bool {
        if self.handles.remove(&handle.id).is_none() {
            return false;
        }
        if let Some(count) = self.refs.get_mut(&handle.generation) {
            *count -= 1;
            if *count == 0 {
                self.refs.remove(&handle.generation);
            }
        }
        true
    }

    fn is_pinned(&self, generation: Generation) -> bool {
        self.refs.contains_key(&generation)
    }
}

/// Wraps a retention policy and keeps snapshotted commits alive
///
/// Pinned commits are withheld from the wrapped policy, so it can never mark
/// them. `snapshot()` and `release()` may be called from any thread while the
/// writer drives the hooks; all of them serialize on one lock.
///
/// Durable writes happen outside the lock so an fsync never stalls the
/// writer's hook. A snapshot is pinned in memory before it reaches disk (and
/// unpinned again if the write fails); a release reaches disk before the
/// in-memory pin is dropped. Either way memory never protects less than disk.
pub struct SnapshotGuard<P> {
    policy: P,
    state: Mutex<PinState>,
    /// Durable ledger; `None` keeps pins in memory only
    store: Option<PinStore>,
}

impl<P: RetentionPolicy> SnapshotGuard<P> {
    /// Guard with in-memory pins. Pins are lost if the process exits.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            state: Mutex::new(PinState::default()),
            store: None,
        }
    }

    /// Guard whose pins are persisted in `store` and restored on `on_init`
    pub fn durable(policy: P, store: PinStore) -> Result<Self> {
        let guard = Self {
            policy,
            state: Mutex::new(PinState::default()),
            store: Some(store),
        };
        {
            let mut state = guard.state.lock();
            guard.restore(&mut state)?;
        }
        Ok(guard)
    }

    /// Pin the newest commit and return a handle for it
    pub fn snapshot(&self) -> Result<SnapshotHandle> {
        let handle = {
            let mut state = self.state.lock();
            let generation = state.latest.ok_or(Error::NoCommitsYet)?;
            let handle = SnapshotHandle {
                id: Ulid::new(),
                generation,
            };
            state.pin(handle);
            handle
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&handle) {
                self.state.lock().unpin(&handle);
                return Err(e);
            }
        }

        info!(
            snapshot = %handle.id,
            generation = %handle.generation,
            refs = self.ref_count(handle.generation),
            "Snapshot taken"
        );
        Ok(handle)
    }

    /// Drop one reference taken by [`SnapshotGuard::snapshot`]
    ///
    /// Once a generation has no references left it becomes eligible for
    /// deletion on the next hook call.
    pub fn release(&self, handle: &SnapshotHandle) -> Result<()> {
        let unknown = || {
            warn!(snapshot = %handle.id, "Rejected release of unknown snapshot");
            Error::UnknownSnapshot { id: handle.id }
        };

        if self.state.lock().handles.get(&handle.id) != Some(&handle.generation) {
            return Err(unknown());
        }

        // The store decides between two racing releases of the same handle
        if let Some(store) = &self.store {
            if !store.remove(&handle.id)? {
                return Err(unknown());
            }
        }

        let mut state = self.state.lock();
        if !state.unpin(handle) {
            return Err(unknown());
        }

        info!(
            snapshot = %handle.id,
            generation = %handle.generation,
            refs = state.refs.get(&handle.generation).copied().unwrap_or(0),
            "Snapshot released"
        );
        Ok(())
    }

    /// Look up an outstanding snapshot by id
    pub fn find(&self, id: &Ulid) -> Option<SnapshotHandle> {
        let state = self.state.lock();
        state.handles.get(id).map(|&generation| SnapshotHandle {
            id: *id,
            generation,
        })
    }

    /// Outstanding references on `generation`
    pub fn ref_count(&self, generation: Generation) -> usize {
        self.state.lock().refs.get(&generation).copied().unwrap_or(0)
    }

    /// Generations with at least one reference, oldest first
    pub fn pinned_generations(&self) -> Vec<Generation> {
        self.state.lock().refs.keys().copied().collect()
    }

    /// Every outstanding handle, oldest generation first
    pub fn snapshots(&self) -> Vec<SnapshotHandle> {
        let state = self.state.lock();
        let mut handles: Vec<_> = state
            .handles
            .iter()
            .map(|(&id, &generation)| SnapshotHandle { id, generation })
            .collect();
        handles.sort_by_key(|h| (h.generation, h.id));
        handles
    }

    /// Newest generation seen by a hook
    pub fn latest(&self) -> Option<Generation> {
        self.state.lock().latest
    }

    /// The wrapped policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Load pins from the durable ledger
    fn restore(&self, state: &mut PinState) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        // Merge: a snapshot still on its way to disk stays pinned
        for (id, record) in store.load()? {
            if !state.handles.contains_key(&id) {
                state.pin(SnapshotHandle {
                    id,
                    generation: record.generation,
                });
            }
        }

        if !state.handles.is_empty() {
            info!(
                snapshots = state.handles.len(),
                generations = state.refs.len(),
                "Restored snapshots from disk"
            );
        }
        Ok(())
    }

    fn apply(&self, commits: &[CommitRecord], init: bool) -> Result<()> {
        check_ordered(commits)?;

        let mut state = self.state.lock();
        if init {
            self.restore(&mut state)?;
            for &generation in state.refs.keys() {
                if commits.binary_search_by_key(&generation, |c| c.generation()).is_err() {
                    warn!(
                        generation = %generation,
                        "Snapshot pins a commit that no longer exists"
                    );
                }
            }
        }

        let candidates: Vec<CommitRecord> = commits
            .iter()
            .filter(|c| !state.is_pinned(c.generation()))
            .cloned()
            .collect();

        debug!(
            total = commits.len(),
            protected = commits.len() - candidates.len(),
            "Forwarding unpinned commits to wrapped policy"
        );

        // Still holding the lock: no snapshot can land between partition and decision
        if init {
            self.policy.on_init(&candidates)?;
        } else {
            self.policy.on_commit(&candidates)?;
        }

        // Only a commit that survives this hook may be snapshotted next
        state.latest = commits
            .iter()
            .rev()
            .find(|c| !c.is_deleted())
            .map(|c| c.generation());
        Ok(())
    }
}

impl<P: RetentionPolicy> RetentionPolicy for SnapshotGuard<P> {
    fn on_init(&self, commits: &[CommitRecord]) -> Result<()> {
        self.apply(commits, true)
    }

    fn on_commit(&self, commits: &[CommitRecord]) -> Result<()> {
        self.apply(commits, false)
    }
}
