//! Persistence layer for hostguardd
//!
//! Provides:
//! - Session state document (whole-document replacement)
//! - Session history (append-only)
//! - JSON file store with atomic writes and corrupt-file quarantine
//! - In-memory store for tests

mod documents;
mod json;
mod memory;
mod traits;

pub use documents::*;
pub use json::*;
pub use memory::*;
pub use traits::*;

use std::path::PathBuf;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt document {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
