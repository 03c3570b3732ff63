//! Error taxonomy for retention and snapshot operations

use crate::commit::Generation;
use ulid::Ulid;

/// Result type used throughout keeper
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by policies, snapshot guards and writers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid retention parameter, raised while building a policy
    #[error("invalid retention configuration: {0}")]
    Configuration(String),

    /// `snapshot()` was called before any commit was seen
    #[error("no commit exists yet, nothing to snapshot")]
    NoCommitsYet,

    /// `release()` was given a handle that is not outstanding
    #[error("unknown snapshot {id} (never issued or already released)")]
    UnknownSnapshot { id: Ulid },

    /// Physical deletion of one commit failed; isolated to that commit
    #[error("failed to delete commit {generation}: {reason}")]
    DeletionRequest {
        generation: Generation,
        reason: String,
    },

    /// A hook was handed a list that is not strictly increasing
    #[error("commit list out of order: {next} follows {previous}")]
    UnorderedCommits {
        previous: Generation,
        next: Generation,
    },

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can retry or continue after this error
    ///
    /// Configuration and ordering errors point at a bug or bad input and
    /// will not go away on their own.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::NoCommitsYet | Error::UnknownSnapshot { .. } | Error::DeletionRequest { .. } => {
                true
            }
            Error::Configuration(_) | Error::UnorderedCommits { .. } => false,
            Error::Storage(_) | Error::Codec(_) | Error::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::NoCommitsYet.is_recoverable());
        assert!(Error::UnknownSnapshot { id: Ulid::nil() }.is_recoverable());
        assert!(Error::DeletionRequest {
            generation: Generation::new(3),
            reason: "gone".into(),
        }
        .is_recoverable());
        assert!(!Error::Configuration("n = -1".into()).is_recoverable());
    }

    #[test]
    fn test_display_names_generation() {
        let err = Error::DeletionRequest {
            generation: Generation::new(7),
            reason: "permission denied".into(),
        };
        assert_eq!(err.to_string(), "failed to delete commit 7: permission denied");
    }
}
