/// Entry that expands to the server's own `PATH`
pub const INHERIT_PATH: &str = "$PATH";

/// Ordered, duplicate-free list of directories for the `PATH` of spawned
/// commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList {
    entries: Vec<String>,
}

impl PathList {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from configured entries, expanding `$PATH` in place using
    /// `inherited` (the server's `PATH` value)
    pub fn from_config(paths: &[String], inherited: Option<&str>) -> Self {
        let mut list = Self::new();
        for path in paths {
            if path == INHERIT_PATH {
                for entry in inherited.unwrap_or_default().split(':') {
                    list.add(entry);
                }
            } else {
                list.add(path);
            }
        }
        list
    }

    /// Append unless already present; empty entries are ignored
    pub fn add(&mut self, path: &str) -> &mut Self {
        if !path.is_empty() && !self.entries.iter().any(|p| p == path) {
            self.entries.push(path.to_string());
        }
        self
    }

    /// Value for the `PATH` environment variable
    pub fn to_env_value(&self) -> String {
        self.entries.join(":")
    }
}
