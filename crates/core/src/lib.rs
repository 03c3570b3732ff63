//! Keeper Core - commit values shared by retention policies and writers
//!
//! This crate provides:
//! - Generation numbers and commit records
//! - Opaque deletion handles (policies mark, writers delete)
//! - The error taxonomy used across the workspace

pub mod commit;
pub mod error;

// Re-export main types for convenience
pub use commit::{check_ordered, deletion_set, CommitRecord, DeletionHandle, Generation};
pub use error::{Error, Result};
