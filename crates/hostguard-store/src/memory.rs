//! In-memory store (for testing)

use std::sync::Mutex;

use crate::{HistoryRecord, StateDocument, Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    state: Option<StateDocument>,
    history: Vec<HistoryRecord>,
    fail_writes: bool,
    saves: usize,
}

/// Store that keeps documents in memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a state document
    pub fn with_state(state: StateDocument) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.state = Some(state);
        }
        store
    }

    /// Make every subsequent write fail with an IO error
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    /// Number of successful `save_state` calls
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.saves).unwrap_or(0)
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> StoreResult<T>) -> StoreResult<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;
        f(&mut inner)
    }
}

fn write_failure() -> StoreError {
    StoreError::Io(std::io::Error::other("simulated write failure"))
}

impl Store for MemoryStore {
    fn load_state(&self) -> StoreResult<Option<StateDocument>> {
        self.with_inner(|inner| Ok(inner.state.clone()))
    }

    fn save_state(&self, state: &StateDocument) -> StoreResult<()> {
        self.with_inner(|inner| {
            if inner.fail_writes {
                return Err(write_failure());
            }
            inner.state = Some(state.clone());
            inner.saves += 1;
            Ok(())
        })
    }

    fn append_history(&self, record: HistoryRecord) -> StoreResult<()> {
        self.with_inner(|inner| {
            if inner.fail_writes {
                return Err(write_failure());
            }
            inner.history.push(record);
            Ok(())
        })
    }

    fn load_history(&self) -> StoreResult<Vec<HistoryRecord>> {
        self.with_inner(|inner| Ok(inner.history.clone()))
    }

    fn is_healthy(&self) -> bool {
        self.inner.lock().map(|i| !i.fail_writes).unwrap_or(false)
    }
}
