//! JSON file store
//!
//! Each document is replaced whole: the new content is written to a
//! temporary file in the same directory and renamed over the old one, so a
//! crash leaves either the previous or the new document on disk.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{HistoryRecord, StateDocument, Store, StoreError, StoreResult};

pub const STATE_FILE: &str = "state.json";
pub const HISTORY_FILE: &str = "history.json";

const CORRUPT_SUFFIX: &str = ".corrupt";

/// Store backed by `state.json` and `history.json` in a data directory
pub struct JsonStore {
    dir: PathBuf,
    state_path: PathBuf,
    history_path: PathBuf,
    // Serializes read-modify-write of the history document
    lock: Mutex<()>,
}

impl JsonStore {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "JSON store opened");

        Ok(Self {
            state_path: dir.join(STATE_FILE),
            history_path: dir.join(HISTORY_FILE),
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    fn guard(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn read_document<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Option<T>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                let quarantined = quarantine(path)?;
                warn!(
                    path = %path.display(),
                    moved_to = %quarantined.display(),
                    error = %e,
                    "Corrupt document set aside, using defaults"
                );
                Ok(None)
            }
        }
    }

    fn write_document<T: Serialize>(&self, path: &Path, doc: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Document written");
        Ok(())
    }
}

/// Move an unreadable document to `<file>.corrupt`, replacing any older one.
fn quarantine(path: &Path) -> StoreResult<PathBuf> {
    let mut name = path.as_os_str().to_os_string();
    name.push(CORRUPT_SUFFIX);
    let target = PathBuf::from(name);
    std::fs::rename(path, &target).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("could not move aside: {}", e),
    })?;
    Ok(target)
}

impl Store for JsonStore {
    fn load_state(&self) -> StoreResult<Option<StateDocument>> {
        let _guard = self.guard()?;
        self.read_document(&self.state_path)
    }

    fn save_state(&self, state: &StateDocument) -> StoreResult<()> {
        let _guard = self.guard()?;
        self.write_document(&self.state_path, state)
    }

    fn append_history(&self, record: HistoryRecord) -> StoreResult<()> {
        let _guard = self.guard()?;
        let mut history: Vec<HistoryRecord> =
            self.read_document(&self.history_path)?.unwrap_or_default();
        history.push(record);
        self.write_document(&self.history_path, &history)?;
        debug!(records = history.len(), "History record appended");
        Ok(())
    }

    fn load_history(&self) -> StoreResult<Vec<HistoryRecord>> {
        let _guard = self.guard()?;
        Ok(self.read_document(&self.history_path)?.unwrap_or_default())
    }

    fn is_healthy(&self) -> bool {
        match self.lock.lock() {
            Ok(_) => self.dir.is_dir(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
