//! Console module
//!
//! Executes command lines on behalf of a browser session and renders the
//! result as HTML:
//! - `command`: tokenizer (`;` splitting, `cd` detection)
//! - `directory`: per-session `cd` / `cd -` emulation
//! - `runner`: shell execution with a timeout
//! - `render`: ANSI color to HTML translation
//! - `prompt`: prompt template and home alias

pub mod command;
pub mod directory;
pub mod error;
pub mod paths;
pub mod prompt;
pub mod render;
pub mod runner;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use command::Directive;
pub use error::ConsoleError;
pub use paths::PathList;
pub use prompt::PromptTemplate;
pub use runner::ShellRunner;

use crate::config::ConsoleConfig;
use crate::logger;
use crate::session::SessionState;

/// Result of running one command line
#[derive(Debug, Default)]
pub struct LineOutcome {
    /// Rendered output of every segment that ran, plus the error line
    pub html: String,
    /// Number of segments attempted
    pub segments: usize,
    /// First error; later segments were not run
    pub error: Option<ConsoleError>,
}

pub struct Console {
    home: PathBuf,
    home_alias: String,
    prompt: PromptTemplate,
    username: String,
    hostname: Option<String>,
    runner: ShellRunner,
}

impl Console {
    pub fn new(config: &ConsoleConfig, home: PathBuf, paths: &PathList) -> Self {
        let runner = ShellRunner::new(
            config.shell.clone(),
            paths,
            config.term.clone(),
            Duration::from_secs(config.command_timeout),
        );
        Self {
            home,
            home_alias: config.home_alias.clone(),
            prompt: PromptTemplate::new(config.prompt.clone()),
            username: config.username.clone(),
            hostname: config.hostname.clone(),
            runner,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Give a fresh session its starting directory, and move a session whose
    /// directory has disappeared back home
    pub fn ensure_initialized(&self, state: &mut SessionState) {
        match state.pwd {
            Some(ref pwd) if pwd.is_dir() => {}
            Some(ref pwd) => {
                logger::log_warning(&format!(
                    "Session directory {} is gone, resetting to home",
                    pwd.display()
                ));
                state.pwd = Some(self.home.clone());
            }
            None => state.pwd = Some(self.home.clone()),
        }
    }

    /// Current directory of the session
    pub fn cwd<'a>(&'a self, state: &'a SessionState) -> &'a Path {
        state.pwd.as_deref().unwrap_or(&self.home)
    }

    /// Run a command line: segments in order, stopping at the first error.
    ///
    /// `current_working_pwd` is set to the directory the line was typed in
    /// so the echoed prompt shows it; the caller clears it on teardown.
    pub async fn execute_line(
        &self,
        session: &str,
        line: &str,
        state: &mut SessionState,
    ) -> LineOutcome {
        self.ensure_initialized(state);
        state.current_working_pwd.clone_from(&state.pwd);

        let directives = command::tokenize(line);
        logger::log_command(session, line, directives.len());

        let mut outcome = LineOutcome::default();
        for (index, directive) in directives.iter().enumerate() {
            outcome.segments += 1;
            logger::log_segment(session, index, directive);

            match self.execute_directive(directive, state).await {
                Ok(lines) => outcome.html.push_str(&render::render_output(&lines)),
                Err(err) => {
                    outcome.html.push_str(&render::render_error(&err.to_string()));
                    outcome.error = Some(err);
                    break;
                }
            }
        }
        outcome
    }

    async fn execute_directive(
        &self,
        directive: &Directive,
        state: &mut SessionState,
    ) -> Result<Vec<String>, ConsoleError> {
        match directive {
            Directive::ChangeDirectory { target } => {
                directory::change_directory(state, target, &self.home)?;
                Ok(Vec::new())
            }
            Directive::Shell { text } => {
                let cwd = self.cwd(state).to_path_buf();
                match self.runner.run(text, &cwd).await {
                    Err(err @ ConsoleError::ProcessSpawnFailure { .. }) => {
                        logger::log_error(&err.to_string());
                        Ok(vec![err.to_string()])
                    }
                    other => other,
                }
            }
        }
    }

    /// Prompt for the directory the last command was typed in, or the
    /// current directory when no command is running
    pub fn prompt(&self, state: &SessionState, local_host: Option<&str>) -> String {
        let dir = state
            .current_working_pwd
            .as_deref()
            .unwrap_or_else(|| self.cwd(state));
        let host = self
            .hostname
            .as_deref()
            .or(local_host)
            .unwrap_or("localhost");
        self.prompt
            .render(&self.username, host, &self.display_dir(dir))
    }

    /// Display path of the session directory, with the home alias applied
    pub fn display_pwd(&self, state: &SessionState) -> String {
        self.display_dir(self.cwd(state))
    }

    /// Home-aliased directory, escaped for HTML
    fn display_dir(&self, dir: &Path) -> String {
        render::escape_html(&prompt::display_dir(dir, &self.home, &self.home_alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_PROMPT};

    struct Fixture {
        _dir: tempfile::TempDir,
        home: PathBuf,
        console: Console,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap().join("home");
        std::fs::create_dir_all(home.join("sub")).unwrap();

        let config = Config::load_from("does-not-exist/webconsole").unwrap();
        let inherited = std::env::var("PATH").ok();
        let paths = PathList::from_config(&config.console.paths, inherited.as_deref());
        let console = Console::new(&config.console, home.clone(), &paths);
        Fixture {
            _dir: dir,
            home,
            console,
        }
    }

    #[tokio::test]
    async fn test_segments_run_in_order() {
        let fx = fixture();
        let mut state = SessionState::default();

        let outcome = fx
            .console
            .execute_line("test", " echo one ;echo two;  echo three ", &mut state)
            .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.segments, 3);
        assert_eq!(outcome.html, "one<br />\ntwo<br />\nthree<br />\n");
    }

    #[tokio::test]
    async fn test_cd_then_pwd_in_same_line() {
        let fx = fixture();
        let mut state = SessionState::default();

        let outcome = fx
            .console
            .execute_line("test", "cd sub; pwd -P", &mut state)
            .await;
        let sub = fx.home.join("sub");
        assert_eq!(
            outcome.html,
            format!("{}<br />\n", sub.to_string_lossy().replace(' ', "&nbsp;"))
        );
        assert_eq!(state.pwd, Some(sub));
        assert_eq!(state.oldpwd.as_deref(), Some(fx.home.as_path()));
        // Prompt shows where the line was typed
        assert_eq!(state.current_working_pwd.as_deref(), Some(fx.home.as_path()));
    }

    #[tokio::test]
    async fn test_cd_dash_across_requests() {
        let fx = fixture();
        let mut state = SessionState::default();

        fx.console.execute_line("test", "cd sub", &mut state).await;
        fx.console.execute_line("test", "cd", &mut state).await;
        assert_eq!(state.pwd.as_deref(), Some(fx.home.as_path()));

        fx.console.execute_line("test", "cd -", &mut state).await;
        assert_eq!(state.pwd, Some(fx.home.join("sub")));
    }

    #[tokio::test]
    async fn test_failed_cd_stops_line() {
        let fx = fixture();
        let mut state = SessionState::default();

        let outcome = fx
            .console
            .execute_line("test", "echo before; cd missing; echo after", &mut state)
            .await;
        assert_eq!(
            outcome.error,
            Some(ConsoleError::DirectoryNotFound {
                path: PathBuf::from("missing")
            })
        );
        assert_eq!(outcome.segments, 2);
        assert!(outcome.html.starts_with("before<br />\n<span class=\"error\">"));
        assert!(!outcome.html.contains("after"));
        assert_eq!(state.pwd.as_deref(), Some(fx.home.as_path()));
        assert!(state.oldpwd.is_none());
    }

    #[tokio::test]
    async fn test_colored_output_rendered() {
        let fx = fixture();
        let mut state = SessionState::default();

        let outcome = fx
            .console
            .execute_line("test", r"printf '\033[1;32mok\033[0m\n'", &mut state)
            .await;
        assert_eq!(outcome.html, "<span class=\"color-32\">ok</span><br />\n");
    }

    #[test]
    fn test_prompt_uses_home_alias() {
        let fx = fixture();
        let mut state = SessionState::default();
        fx.console.ensure_initialized(&mut state);

        assert_eq!(
            fx.console.prompt(&state, Some("10.0.0.1")),
            PromptTemplate::new(DEFAULT_PROMPT).render("console", "10.0.0.1", "~/")
        );
        assert_eq!(fx.console.display_pwd(&state), "~/");

        state.current_working_pwd = Some(fx.home.join("sub"));
        let expected_dir = fx.home.join("sub").to_string_lossy().into_owned();
        assert!(fx.console.prompt(&state, None).contains(&expected_dir));
        assert!(fx.console.prompt(&state, None).contains("console@localhost"));
    }

    #[test]
    fn test_display_path_is_escaped() {
        let fx = fixture();
        let odd = fx.home.join("a<b>");
        std::fs::create_dir(&odd).unwrap();
        let state = SessionState {
            pwd: Some(odd),
            ..SessionState::default()
        };
        let shown = fx.console.display_pwd(&state);
        assert!(shown.ends_with("/a&lt;b&gt;"));
    }

    #[test]
    fn test_vanished_directory_resets_to_home() {
        let fx = fixture();
        let mut state = SessionState {
            pwd: Some(fx.home.join("deleted")),
            ..SessionState::default()
        };
        fx.console.ensure_initialized(&mut state);
        assert_eq!(state.pwd.as_deref(), Some(fx.home.as_path()));
    }
}
