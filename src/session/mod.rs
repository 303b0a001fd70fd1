//! Session module
//!
//! Binds browser sessions (identified by a cookie carrying a UUID) to their
//! console state. Requests of one session are serialized with a per-session
//! lock because every request reads, modifies and writes the state.

mod state;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

pub use state::{SessionRecord, SessionState};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use crate::config::SessionConfig;
use crate::logger;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session store {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("failed to serialize sessions: {0}")]
    Serialize(String),
}

pub struct SessionManager {
    store: Box<dyn SessionStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    idle_timeout: i64,
}

impl SessionManager {
    pub fn new(store: Box<dyn SessionStore>, idle_timeout: u64) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            idle_timeout: i64::try_from(idle_timeout).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let store: Box<dyn SessionStore> = match config.store_file {
            Some(ref path) => Box::new(FileSessionStore::open(path)?),
            None => Box::new(MemorySessionStore::new()),
        };
        Ok(Self::new(store, config.idle_timeout))
    }

    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Only ids this server could have issued are accepted from cookies
    pub fn is_valid_id(id: &str) -> bool {
        uuid::Uuid::parse_str(id).is_ok()
    }

    /// Wait for exclusive access to a session
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Whether a live record exists for `id`
    pub fn exists(&self, id: &str) -> bool {
        self.store
            .get(id)
            .is_some_and(|record| !self.is_expired(&record, now()))
    }

    /// Console state of a session; empty for unknown or expired sessions
    pub fn load(&self, id: &str) -> SessionState {
        match self.store.get(id) {
            Some(record) if !self.is_expired(&record, now()) => record.state(),
            _ => SessionState::default(),
        }
    }

    /// Write the state back and persist the store
    pub fn store(&self, id: &str, state: SessionState) -> Result<(), SessionError> {
        let mut record = self
            .store
            .get(id)
            .unwrap_or_else(|| SessionRecord::new(now()));
        record.last_seen = now();
        record.set_state(state);
        self.store.set(id, record);
        self.store.save()
    }

    /// Drop sessions idle for longer than the idle timeout
    pub fn purge_expired(&self) -> usize {
        let expired = self.store.expired(now().saturating_sub(self.idle_timeout));
        if expired.is_empty() {
            return 0;
        }
        {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            for id in &expired {
                self.store.remove(id);
                // A lock held by a running request keeps its Arc alive
                if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
                    locks.remove(id);
                }
            }
        }
        if let Err(e) = self.store.save() {
            logger::log_error(&format!("Failed to persist session purge: {e}"));
        }
        expired.len()
    }

    const fn is_expired(&self, record: &SessionRecord, now: i64) -> bool {
        now.saturating_sub(record.last_seen) > self.idle_timeout
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager(idle_timeout: u64) -> SessionManager {
        SessionManager::new(Box::new(MemorySessionStore::new()), idle_timeout)
    }

    fn at(pwd: &str) -> SessionState {
        SessionState {
            pwd: Some(PathBuf::from(pwd)),
            ..SessionState::default()
        }
    }

    #[test]
    fn test_ids_are_uuids() {
        let id = SessionManager::new_id();
        assert!(SessionManager::is_valid_id(&id));
        assert!(!SessionManager::is_valid_id("../../etc/passwd"));
        assert!(!SessionManager::is_valid_id(""));
    }

    #[test]
    fn test_load_store() {
        let sessions = manager(3600);
        let id = SessionManager::new_id();
        assert!(!sessions.exists(&id));
        assert_eq!(sessions.load(&id), SessionState::default());

        sessions.store(&id, at("/srv")).unwrap();
        assert!(sessions.exists(&id));
        assert_eq!(sessions.load(&id), at("/srv"));
    }

    #[test]
    fn test_purge_expired() {
        let store = MemorySessionStore::new();
        let mut stale = SessionRecord::new(now() - 100);
        stale.set_state(at("/old"));
        store.set("stale", stale);
        let sessions = SessionManager::new(Box::new(store), 10);
        sessions.store("fresh", at("/new")).unwrap();

        assert!(!sessions.exists("stale"));
        assert_eq!(sessions.load("stale"), SessionState::default());
        assert_eq!(sessions.purge_expired(), 1);
        assert!(sessions.exists("fresh"));
    }

    #[tokio::test]
    async fn test_lock_serializes_same_session() {
        let sessions = Arc::new(manager(3600));
        let guard = sessions.lock("a").await;

        // Another session is not blocked
        let other = tokio::time::timeout(Duration::from_millis(100), sessions.lock("b")).await;
        assert!(other.is_ok());

        let contender = {
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                let _guard = sessions.lock("a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }
}
