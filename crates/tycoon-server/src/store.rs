//! Durable room store.
//!
//! Each room is one JSON document keyed by its code. `save` is a
//! compare-and-swap on the stored `version`: the caller names the version it
//! read, and the write is refused if anyone else has written since.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use tycoon_core::RoomSnapshot;

use crate::error::StoreError;

/// Backing storage for room records.
///
/// `expected` is the version the caller last read, 0 for a room that must
/// not exist yet.
pub trait RoomStore: Send + Sync {
    fn load(&self, code: &str) -> Result<Option<RoomSnapshot>, StoreError>;

    fn load_all(&self) -> Result<Vec<RoomSnapshot>, StoreError>;

    fn save(&self, snapshot: &RoomSnapshot, expected: u64) -> Result<(), StoreError>;

    fn delete(&self, code: &str) -> Result<(), StoreError>;
}

/// In-process store, used when no data directory is configured
#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<String, RoomSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryStore {
    fn load(&self, code: &str) -> Result<Option<RoomSnapshot>, StoreError> {
        Ok(self.rooms.get(code).map(|r| r.clone()))
    }

    fn load_all(&self) -> Result<Vec<RoomSnapshot>, StoreError> {
        Ok(self.rooms.iter().map(|r| r.value().clone()).collect())
    }

    fn save(&self, snapshot: &RoomSnapshot, expected: u64) -> Result<(), StoreError> {
        match self.rooms.entry(snapshot.id.clone()) {
            Entry::Occupied(mut entry) => {
                let found = entry.get().version;
                if found != expected {
                    return Err(StoreError::VersionConflict { expected, found });
                }
                entry.insert(snapshot.clone());
            }
            Entry::Vacant(entry) => {
                if expected != 0 {
                    return Err(StoreError::VersionConflict { expected, found: 0 });
                }
                entry.insert(snapshot.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<(), StoreError> {
        self.rooms.remove(code);
        Ok(())
    }
}

/// One `<CODE>.json` file per room in a directory
pub struct FileStore {
    dir: PathBuf,
    /// Serializes the read-compare-write of `save`, per room
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, code: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(code.to_string()).or_default().value())
    }

    fn path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}.json", code))
    }

    fn read(path: &Path) -> Result<Option<RoomSnapshot>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RoomStore for FileStore {
    fn load(&self, code: &str) -> Result<Option<RoomSnapshot>, StoreError> {
        Self::read(&self.path(code))
    }

    fn load_all(&self) -> Result<Vec<RoomSnapshot>, StoreError> {
        let mut rooms = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path) {
                Ok(Some(room)) => rooms.push(room),
                Ok(None) => {}
                // One bad file should not keep every other room offline
                Err(StoreError::Serde(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt room file")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(rooms)
    }

    fn save(&self, snapshot: &RoomSnapshot, expected: u64) -> Result<(), StoreError> {
        let lock = self.lock_for(&snapshot.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path(&snapshot.id);

        let found = Self::read(&path)?.map_or(0, |r| r.version);
        if found != expected {
            return Err(StoreError::VersionConflict { expected, found });
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<(), StoreError> {
        let lock = self.lock_for(code);
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = match fs::remove_file(self.path(code)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        drop(guard);
        self.locks.remove(code);
        result
    }
}

/// Exponential backoff for transient store failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Run a store operation on the blocking pool, retrying I/O errors with
/// exponential backoff.
///
/// Conflicts and corrupt records are returned immediately.
pub async fn with_retry<T, F>(policy: &RetryPolicy, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: Fn() -> Result<T, StoreError> + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        let run = Arc::clone(&op);
        let result = tokio::task::spawn_blocking(move || run())
            .await
            .map_err(|e| StoreError::Io(io::Error::new(ErrorKind::Other, e.to_string())))
            .and_then(|r| r);
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                let delay = policy.base_delay * 2u32.pow(attempt);
                warn!(attempt = attempt + 1, error = %e, ?delay, "Store operation failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Save a room, retrying transient failures
pub async fn persist_with_retry(
    store: Arc<dyn RoomStore>,
    snapshot: RoomSnapshot,
    expected: u64,
    policy: &RetryPolicy,
) -> Result<(), StoreError> {
    with_retry(policy, move || store.save(&snapshot, expected)).await
}
