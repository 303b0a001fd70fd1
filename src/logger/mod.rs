//! Logger module
//!
//! Provides logging utilities for the console server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Leveled debug/info/warning/error logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::Level;

use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config.logging.level.parse().unwrap_or_else(|e| {
        eprintln!("[WARN] {e}, falling back to info");
        Level::Info
    });
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write_server(level, &format!("[{}] {message}", level.tag())),
        None if level >= Level::Warn => eprintln!("[{}] {message}", level.tag()),
        None => println!("[{}] {message}", level.tag()),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, home: &std::path::Path) {
    log_info("======================================");
    log_info("Web console started successfully");
    log_info(&format!("Listening on: http://{addr}"));
    log_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        log_info(&format!("Worker threads: {workers}"));
    }
    log_info(&format!("Home directory: {}", home.display()));
    log_info(&format!(
        "Command timeout: {}s",
        config.console.command_timeout
    ));
    match config.session.store_file {
        Some(ref path) => log_info(&format!("Session store: {path}")),
        None => log_info("Session store: memory"),
    }
    if config.auth.enabled {
        log_info(&format!(
            "Digest authentication enabled (realm \"{}\", {} user(s))",
            config.auth.realm,
            config.auth.users.len()
        ));
    } else {
        log_warning("Digest authentication disabled: anyone reaching this port can run commands");
    }
    if let Some(ref path) = config.logging.access_log_file {
        log_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        log_info(&format!("Error log: {path}"));
    }
    log_info("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_debug(message: &str) {
    write(Level::Debug, message);
}

pub fn log_info(message: &str) {
    write(Level::Info, message);
}

pub fn log_warning(message: &str) {
    write(Level::Warn, message);
}

pub fn log_error(message: &str) {
    write(Level::Error, message);
}

/// Log a command line about to run in a session
pub fn log_command(session: &str, line: &str, segments: usize) {
    log_info(&format!(
        "[Console] session={session} segments={segments} command={line:?}"
    ));
}

pub fn log_segment(session: &str, index: usize, directive: &impl std::fmt::Debug) {
    log_debug(&format!("[Console] session={session} #{index} {directive:?}"));
}

pub fn log_auth_failure(peer_addr: &SocketAddr, reason: &impl std::fmt::Display) {
    log_warning(&format!("[Auth] Rejected {peer_addr}: {reason}"));
}

pub fn log_session_created(session: &str) {
    log_debug(&format!("[Session] Created {session}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}
