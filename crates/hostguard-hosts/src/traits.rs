//! Host table trait

use async_trait::async_trait;
use thiserror::Error;

use crate::EffectiveBlockSet;

/// Errors from host table operations
#[derive(Debug, Error)]
pub enum HostTableError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for HostTableError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            HostTableError::PermissionDenied(e.to_string())
        } else {
            HostTableError::Io(e)
        }
    }
}

pub type HostTableResult<T> = Result<T, HostTableError>;

/// Result of a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Redirect lines now in the managed section
    pub entries: usize,
    /// False when the table already matched and nothing was written
    pub changed: bool,
}

/// A name-resolution table with one region owned by hostguard.
///
/// Both operations are idempotent and touch nothing outside the managed
/// section.
#[async_trait]
pub trait HostTable: Send + Sync {
    /// Replace the managed section with entries for `set`
    async fn apply(&self, set: &EffectiveBlockSet) -> HostTableResult<ApplyOutcome>;

    /// Remove the managed section
    async fn clear(&self) -> HostTableResult<ApplyOutcome>;

    /// Optional: check if the table is reachable
    fn is_healthy(&self) -> bool {
        true
    }
}
