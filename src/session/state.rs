use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Namespace key the console state is stored under inside a session record
pub const NAMESPACE: &str = "webconsole";

/// Working-directory state of one browser session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Current directory of the emulated shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<PathBuf>,
    /// Directory `cd -` returns to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldpwd: Option<PathBuf>,
    /// Directory the current command line was typed in; only set while a
    /// request is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_working_pwd: Option<PathBuf>,
}

/// Everything stored for one session id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unix timestamp of the last request
    pub last_seen: i64,
    #[serde(default)]
    pub data: BTreeMap<String, SessionState>,
}

impl SessionRecord {
    pub fn new(last_seen: i64) -> Self {
        Self {
            last_seen,
            data: BTreeMap::new(),
        }
    }

    /// Console state of this session, empty when never written
    pub fn state(&self) -> SessionState {
        self.data.get(NAMESPACE).cloned().unwrap_or_default()
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.data.insert(NAMESPACE.to_string(), state);
    }
}
