// Session store module
// Key-value storage of session records, in memory or persisted to a TOML file

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use super::state::SessionRecord;
use super::SessionError;

/// Storage backend for session records
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str) -> Option<SessionRecord>;

    fn set(&self, id: &str, record: SessionRecord);

    fn remove(&self, id: &str);

    /// Ids of records last seen before `cutoff` (unix seconds)
    fn expired(&self, cutoff: i64) -> Vec<String>;

    /// Make pending changes durable
    fn save(&self) -> Result<(), SessionError>;
}

/// Records kept in process memory only
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records(records: HashMap<String, SessionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn snapshot(&self) -> HashMap<String, SessionRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &str) -> Option<SessionRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn set(&self, id: &str, record: SessionRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), record);
    }

    fn remove(&self, id: &str) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn expired(&self, cutoff: i64) -> Vec<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, record)| record.last_seen < cutoff)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn save(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Records kept in memory and written to a TOML file on every save
pub struct FileSessionStore {
    path: PathBuf,
    inner: MemorySessionStore,
    /// Serializes writers of the temporary file
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open the store, loading existing records. A missing file is an empty
    /// store; an unreadable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let records = if path.exists() {
            Self::load(&path)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            inner: MemorySessionStore::with_records(records),
            write_lock: Mutex::new(()),
        })
    }

    fn load(path: &Path) -> Result<HashMap<String, SessionRecord>, SessionError> {
        let content = fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| SessionError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, id: &str) -> Option<SessionRecord> {
        self.inner.get(id)
    }

    fn set(&self, id: &str, record: SessionRecord) {
        self.inner.set(id, record);
    }

    fn remove(&self, id: &str) {
        self.inner.remove(id);
    }

    fn expired(&self, cutoff: i64) -> Vec<String> {
        self.inner.expired(cutoff)
    }

    fn save(&self) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let content = toml::to_string_pretty(&self.inner.snapshot())
            .map_err(|e| SessionError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| SessionError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
