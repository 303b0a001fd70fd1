//! Shell runner
//!
//! Executes one shell segment through `<shell> -c` in the session's
//! directory with stderr redirected to stdout, and collects the output lines.
//! On Unix each run gets its own process group so a timeout takes down
//! everything the command started, not only the shell.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::error::ConsoleError;
use super::paths::PathList;

#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    path_env: String,
    term: String,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(
        shell: impl Into<String>,
        paths: &PathList,
        term: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            shell: shell.into(),
            path_env: paths.to_env_value(),
            term: term.into(),
            timeout,
        }
    }

    /// Run `command` in `cwd` and return its output lines (stdout with
    /// stderr merged). The child is killed when the timeout expires.
    pub async fn run(&self, command: &str, cwd: &Path) -> Result<Vec<String>, ConsoleError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .current_dir(cwd)
            .env("PATH", &self.path_env)
            .env("TERM", &self.term)
            .env("CLICOLOR_FORCE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| ConsoleError::ProcessSpawnFailure {
            shell: self.shell.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConsoleError::ProcessSpawnFailure {
                    shell: self.shell.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                return Err(ConsoleError::Timeout {
                    command: command.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        // Anything the shell wrote before the redirect took effect
        let mut lines = split_lines(&output.stdout);
        lines.extend(split_lines(&output.stderr));
        Ok(lines)
    }
}

/// SIGKILL every process left in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    use crate::logger;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => logger::log_warning(&format!("Failed to kill process group {pid}: {e}")),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|l| l.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(timeout: Duration) -> ShellRunner {
        let inherited = std::env::var("PATH").ok();
        let paths = PathList::from_config(&["$PATH".to_string()], inherited.as_deref());
        ShellRunner::new("/bin/sh", &paths, "xterm-256color", timeout)
    }

    #[tokio::test]
    async fn test_captures_stdout_lines() {
        let dir = tempfile::tempdir().unwrap();
        let lines = runner(Duration::from_secs(10))
            .run("printf 'a\\nb  \\n'", dir.path())
            .await
            .unwrap();
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_merges_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let lines = runner(Duration::from_secs(10))
            .run("echo out; echo err >&2", dir.path())
            .await
            .unwrap();
        assert_eq!(lines, vec!["out".to_string(), "err".to_string()]);
    }

    #[tokio::test]
    async fn test_runs_in_given_directory_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().canonicalize().unwrap();
        let lines = runner(Duration::from_secs(10))
            .run("pwd -P; echo $TERM $CLICOLOR_FORCE", &cwd)
            .await
            .unwrap();
        assert_eq!(lines[0], cwd.to_string_lossy());
        assert_eq!(lines[1], "xterm-256color 1");
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(Duration::from_millis(200))
            .run("sleep 5", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(Duration::from_millis(300))
            .run("(sleep 1; touch marker); true", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathList::new();
        let err = ShellRunner::new("/nonexistent/sh", &paths, "dumb", Duration::from_secs(1))
            .run("true", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::ProcessSpawnFailure { .. }));
    }
}
