//! Commit retention and snapshot protection
//!
//! This crate provides:
//! - Retention policies (keep only last, keep last N, keep all)
//! - Snapshot guard pinning commits against deletion
//! - Durable pin store (sled embedded DB)
//! - Append-only commit journal driving the policy hooks

pub mod journal;
pub mod pins;
pub mod retention;
pub mod snapshot;

// Re-exports
pub use journal::{reclaim, CommitMeta, Journal, ReclaimReport};
pub use keeper_core::{CommitRecord, Error, Generation, Result};
pub use pins::{PinRecord, PinStore};
pub use retention::{build_policy, KeepAll, KeepLastN, KeepOnlyLast, PolicyKind, RetentionPolicy};
pub use snapshot::{SnapshotGuard, SnapshotHandle};
