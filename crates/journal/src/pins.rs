//! Durable record of outstanding snapshots using sled

use crate::snapshot::SnapshotHandle;
use keeper_core::{Generation, Result};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use ulid::Ulid;

/// What is persisted for each outstanding snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    /// Generation the snapshot pins
    pub generation: Generation,
    /// When the snapshot was taken (Unix milliseconds, from the handle's ULID)
    pub taken_at_ms: u64,
}

/// Snapshot ledger kept next to the commits it protects
///
/// Key: handle ULID (16 bytes). Value: bincode [`PinRecord`].
/// Reference counts are the number of records per generation.
pub struct PinStore {
    db: Db,
}

impl PinStore {
    /// Open or create the pin store inside `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join("snapshots.db"))?;
        Ok(Self { db })
    }

    /// Persist a newly issued snapshot
    pub fn insert(&self, handle: &SnapshotHandle) -> Result<()> {
        let record = PinRecord {
            generation: handle.generation,
            taken_at_ms: handle.id.timestamp_ms(),
        };
        let value = bincode::serialize(&record)?;
        self.db.insert(handle.id.to_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    /// Forget a released snapshot. Returns whether it was present.
    pub fn remove(&self, id: &Ulid) -> Result<bool> {
        let existed = self.db.remove(id.to_bytes())?.is_some();
        self.db.flush()?;
        Ok(existed)
    }

    /// Every outstanding snapshot, in handle order
    pub fn load(&self) -> Result<Vec<(Ulid, PinRecord)>> {
        let mut pins = Vec::new();
        for item in self.db.iter() {
            let (key, value) = item?;
            let raw: [u8; 16] = key.as_ref().try_into().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("snapshot key must be 16 bytes, got {}", key.len()),
                )
            })?;
            let record: PinRecord = bincode::deserialize(&value)?;
            pins.push((Ulid::from_bytes(raw), record));
        }
        Ok(pins)
    }

    /// Number of outstanding snapshots
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn handle(generation: u64) -> SnapshotHandle {
        SnapshotHandle {
            id: Ulid::new(),
            generation: Generation::new(generation),
        }
    }

    #[test]
    fn test_insert_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = PinStore::open(temp_dir.path()).unwrap();

        let a = handle(3);
        let b = handle(3);
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();

        let pins = store.load().unwrap();
        assert_eq!(pins.len(), 2);
        assert!(pins.iter().all(|(_, r)| r.generation == Generation::new(3)));
        assert!(pins.iter().any(|(id, _)| *id == a.id));
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = PinStore::open(temp_dir.path()).unwrap();

        let a = handle(9);
        store.insert(&a).unwrap();
        assert!(store.remove(&a.id).unwrap());
        assert!(!store.remove(&a.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let a = handle(5);

        {
            let store = PinStore::open(temp_dir.path()).unwrap();
            store.insert(&a).unwrap();
        }

        let store = PinStore::open(temp_dir.path()).unwrap();
        let pins = store.load().unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].0, a.id);
        assert_eq!(pins[0].1.generation, Generation::new(5));
        assert_eq!(pins[0].1.taken_at_ms, a.id.timestamp_ms());
    }
}
