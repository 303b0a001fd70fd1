// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

// Re-export public types
pub use state::AppState;
pub use types::{AuthConfig, Config, ConsoleConfig, SessionConfig};

/// Default prompt: `console@127.0.0.1 <pwd> $ `
pub const DEFAULT_PROMPT: &str = r#"{user}@{host} <span class="pwd">{pwd}</span> $ "#;

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("WEBCONSOLE").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.backlog", 128)?
            .set_default("server.shutdown_grace", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "webconsole/0.1")?
            .set_default("http.max_body_size", 65_536)? // 64KB
            .set_default("http.health_path", "/healthz")?
            .set_default("console.home", "")?
            .set_default("console.home_alias", "~/")?
            .set_default("console.prompt", DEFAULT_PROMPT)?
            .set_default("console.username", "console")?
            .set_default("console.paths", vec!["$PATH"])?
            .set_default("console.shell", "/bin/sh")?
            .set_default("console.term", "xterm-256color")?
            .set_default("console.command_timeout", 30)?
            .set_default("session.cookie_name", "WEBCONSOLESESSID")?
            .set_default("session.idle_timeout", 86_400)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Home directory with the empty default resolved to the current directory
    pub fn resolved_home(&self) -> std::io::Result<PathBuf> {
        if self.console.home.is_empty() {
            std::env::current_dir()
        } else {
            Ok(PathBuf::from(&self.console.home))
        }
    }
}
