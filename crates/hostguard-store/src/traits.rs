//! Store trait definitions

use crate::{HistoryRecord, StateDocument, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // State document

    /// Load the state document; `None` when nothing has been persisted yet.
    ///
    /// Implementations recover from unreadable documents by setting them
    /// aside and returning `None`.
    fn load_state(&self) -> StoreResult<Option<StateDocument>>;

    /// Replace the state document
    fn save_state(&self, state: &StateDocument) -> StoreResult<()>;

    // History

    /// Append a history record
    fn append_history(&self, record: HistoryRecord) -> StoreResult<()>;

    /// Load history, oldest first
    fn load_history(&self) -> StoreResult<Vec<HistoryRecord>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
