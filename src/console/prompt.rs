use std::path::Path;

/// Prompt template with `{user}`, `{host}` and `{pwd}` slots
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, user: &str, host: &str, pwd: &str) -> String {
        fill_slots(
            &self.template,
            &[("{user}", user), ("{host}", host), ("{pwd}", pwd)],
        )
    }
}

/// Replace each `(marker, value)` occurrence in one pass over `template`.
///
/// Values are copied as-is and never searched for markers themselves.
pub fn fill_slots(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match slots.iter().find(|(marker, _)| rest.starts_with(marker)) {
            Some((marker, value)) => {
                out.push_str(value);
                rest = &rest[marker.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Display form of a directory: `alias` when it is the home directory
/// (compared case-insensitively), the full path otherwise
pub fn display_dir(dir: &Path, home: &Path, alias: &str) -> String {
    let dir = dir.to_string_lossy();
    if dir.to_lowercase() == home.to_string_lossy().to_lowercase() {
        alias.to_string()
    } else {
        dir.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT;

    #[test]
    fn test_render_default_template() {
        let prompt = PromptTemplate::new(DEFAULT_PROMPT);
        assert_eq!(
            prompt.render("console", "127.0.0.1", "/var/www"),
            r#"console@127.0.0.1 <span class="pwd">/var/www</span> $ "#
        );
    }

    #[test]
    fn test_slots_may_repeat_or_be_missing() {
        let prompt = PromptTemplate::new("[{pwd}] {pwd} >");
        assert_eq!(prompt.render("u", "h", "/x"), "[/x] /x >");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let prompt = PromptTemplate::new("{user}@{host} {pwd} $ ");
        assert_eq!(
            prompt.render("{pwd}", "{user}", "/srv/{host}"),
            "{pwd}@{user} /srv/{host} $ "
        );
        assert_eq!(fill_slots("{{x}} {y", &[("{x}", "1")]), "{1} {y");
    }

    #[test]
    fn test_home_alias_case_insensitive() {
        let home = Path::new("/Srv/WWW");
        assert_eq!(display_dir(Path::new("/srv/www"), home, "~/"), "~/");
        assert_eq!(display_dir(Path::new("/Srv/WWW"), home, "~/"), "~/");
        assert_eq!(display_dir(Path::new("/srv/www/app"), home, "~/"), "/srv/www/app");
    }
}
