// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub console: ConsoleConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Listen backlog passed to `listen(2)`
    pub backlog: i32,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
    /// Liveness probe path, served without authentication
    pub health_path: String,
}

/// Console behaviour: home directory, prompt, spawned process environment
#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// Home directory used by `cd`, `cd ~` and as the starting directory.
    /// Empty means the server's working directory at startup.
    #[serde(default)]
    pub home: String,
    /// Display alias substituted for the home directory in the prompt
    pub home_alias: String,
    /// Prompt template with `{user}`, `{host}` and `{pwd}` slots
    pub prompt: String,
    pub username: String,
    /// Host label; falls back to the local socket address when unset
    #[serde(default)]
    pub hostname: Option<String>,
    /// Ordered `PATH` entries; `$PATH` inherits the server's own `PATH`
    pub paths: Vec<String>,
    pub shell: String,
    pub term: String,
    /// Seconds a single command may run before it is killed
    pub command_timeout: u64,
}

/// Session cookie and store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Persist sessions to this TOML file; in-memory only when unset
    #[serde(default)]
    pub store_file: Option<String>,
    /// Seconds of inactivity after which a session is discarded
    pub idle_timeout: u64,
}

/// HTTP Digest authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Username to password mapping
    #[serde(default)]
    pub users: HashMap<String, String>,
}

fn default_realm() -> String {
    "Restricted area".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            realm: default_realm(),
            users: HashMap::new(),
        }
    }
}
