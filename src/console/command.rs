//! Command line tokenizer
//!
//! Splits a command line on `;` and classifies each segment as either a
//! directory change, which is emulated per session, or a shell command.

/// Where a `cd` wants to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    /// `cd`, `cd ~`, `cd ~/anything`
    Home,
    /// `cd -`
    Previous,
    Path(String),
}

/// One executable segment of a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ChangeDirectory { target: CdTarget },
    Shell { text: String },
}

/// Split on `;`, trim, and drop empty segments
pub fn split_segments(line: &str) -> Vec<&str> {
    line.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Classify one trimmed segment
pub fn parse_directive(segment: &str) -> Directive {
    let mut words = segment.splitn(2, char::is_whitespace);
    if words.next() != Some("cd") {
        return Directive::Shell {
            text: segment.to_string(),
        };
    }

    let arg = unquote(words.next().unwrap_or("").trim());
    let target = if arg.is_empty() || arg.starts_with('~') {
        CdTarget::Home
    } else if arg == "-" {
        CdTarget::Previous
    } else {
        CdTarget::Path(arg.to_string())
    };
    Directive::ChangeDirectory { target }
}

/// Tokenize a whole command line
pub fn tokenize(line: &str) -> Vec<Directive> {
    split_segments(line).into_iter().map(parse_directive).collect()
}

/// Strip one pair of matching surrounding quotes
fn unquote(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}
