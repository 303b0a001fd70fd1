use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single command line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("cd: {}: No such file or directory", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("cd: OLDPWD not set")]
    OldPwdNotSet,

    #[error("{command}: timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// The shell itself could not be started. Rendered inline as output
    /// rather than ending the command line.
    #[error("{shell}: {reason}")]
    ProcessSpawnFailure { shell: String, reason: String },
}
