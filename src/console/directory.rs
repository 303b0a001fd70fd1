//! `cd` emulation
//!
//! Each session keeps its own working directory, so directory changes are
//! applied to the session state only and the server process never calls
//! `chdir`. Spawned commands receive the session directory as their cwd.

use std::path::{Path, PathBuf};

use super::command::CdTarget;
use super::error::ConsoleError;
use crate::session::SessionState;

/// Apply a `cd` to the session. On error the state is left untouched.
pub fn change_directory(
    state: &mut SessionState,
    target: &CdTarget,
    home: &Path,
) -> Result<(), ConsoleError> {
    let cwd = state.pwd.clone().unwrap_or_else(|| home.to_path_buf());

    match target {
        CdTarget::Home => {
            let dest = require_dir(home.to_path_buf(), home)?;
            state.oldpwd = Some(cwd);
            state.pwd = Some(dest);
        }
        CdTarget::Previous => {
            let previous = state.oldpwd.clone().ok_or(ConsoleError::OldPwdNotSet)?;
            let dest = require_dir(previous.clone(), &previous)?;
            state.oldpwd = Some(cwd);
            state.pwd = Some(dest);
        }
        CdTarget::Path(arg) => {
            let joined = cwd.join(arg);
            let dest = joined
                .canonicalize()
                .map_err(|_| ConsoleError::DirectoryNotFound {
                    path: PathBuf::from(arg),
                })?;
            let dest = require_dir(dest, Path::new(arg))?;
            state.oldpwd = Some(cwd);
            state.pwd = Some(dest);
        }
    }
    Ok(())
}

fn require_dir(dest: PathBuf, shown: &Path) -> Result<PathBuf, ConsoleError> {
    if dest.is_dir() {
        Ok(dest)
    } else {
        Err(ConsoleError::DirectoryNotFound {
            path: shown.to_path_buf(),
        })
    }
}
