// Application state module
// Everything a request handler needs, built once at startup

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::auth::DigestAuth;
use crate::console::{Console, PathList};
use crate::session::{SessionError, SessionManager};

/// Application state
pub struct AppState {
    pub config: Config,
    pub console: Console,
    pub sessions: SessionManager,
    /// Digest gate; `None` when authentication is disabled
    pub auth: Option<DigestAuth>,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("home directory: {0}")]
    Home(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StateError> {
        let home = config.resolved_home()?;
        // Canonical so the prompt's home check matches resolved `cd` targets
        let home = home.canonicalize().unwrap_or(home);

        let inherited = std::env::var("PATH").ok();
        let paths = PathList::from_config(&config.console.paths, inherited.as_deref());
        let console = Console::new(&config.console, home, &paths);

        let sessions = SessionManager::from_config(&config.session)?;
        let auth = DigestAuth::from_config(&config.auth);

        Ok(Self {
            config: config.clone(),
            console,
            sessions,
            auth,
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
        })
    }
}
