//! Commit records handed to retention policies

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonically increasing commit identifier assigned by the writer
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// The first generation a fresh writer assigns
    pub const FIRST: Generation = Generation(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The generation following this one
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Big-endian encoding, so byte order matches generation order in ordered stores
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a key produced by [`Generation::to_be_bytes`]
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("generation key must be 8 bytes, got {}", bytes.len()),
            ))
        })?;
        Ok(Self(u64::from_be_bytes(raw)))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Opaque mark used to request physical deletion of a commit
///
/// Every clone of a [`CommitRecord`] shares the same handle, so a policy
/// classifying a copied subset is visible to the writer holding the originals.
#[derive(Clone, Default)]
pub struct DeletionHandle(Arc<AtomicBool>);

impl DeletionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record deletion intent. Requesting twice is a no-op.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DeletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeletionHandle").field(&self.is_requested()).finish()
    }
}

/// One commit point as seen by a retention policy
#[derive(Debug, Clone)]
pub struct CommitRecord {
    generation: Generation,
    handle: DeletionHandle,
}

impl CommitRecord {
    /// Create a record for a commit that has not been marked for deletion
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            handle: DeletionHandle::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Ask the writer to delete this commit once the hook returns
    pub fn delete(&self) {
        self.handle.request();
    }

    /// Whether deletion has been requested for this commit
    pub fn is_deleted(&self) -> bool {
        self.handle.is_requested()
    }
}

/// Verify a commit list is strictly increasing by generation
pub fn check_ordered(commits: &[CommitRecord]) -> Result<()> {
    for pair in commits.windows(2) {
        if pair[0].generation >= pair[1].generation {
            return Err(Error::UnorderedCommits {
                previous: pair[0].generation,
                next: pair[1].generation,
            });
        }
    }
    Ok(())
}

/// Generations currently marked for deletion, oldest first
pub fn deletion_set(commits: &[CommitRecord]) -> Vec<Generation> {
    commits
        .iter()
        .filter(|c| c.is_deleted())
        .map(|c| c.generation)
        .collect()
}
