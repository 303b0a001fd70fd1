//! Output rendering
//!
//! Turns raw command output into HTML: text is escaped, spaces become
//! `&nbsp;`, newlines become `<br />` and a subset of ANSI SGR color codes
//! become `<span class="color-N">` tags. Everything else (256-color and RGB
//! sequences, multiple attributes, cursor movement) is passed through as is.

const ESC: char = '\x1b';

/// Scanner state while walking the output
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Plain text, no span open
    Normal,
    /// Plain text inside `<span class="color-N">`
    InSpan(u16),
    /// After `ESC`, collecting `[` and parameter bytes; `span` is the color
    /// open when the escape started
    InEscape { raw: String, span: Option<u16> },
}

/// What a complete `ESC[...m` sequence asks for
#[derive(Debug, PartialEq, Eq)]
enum Sgr {
    Reset,
    Color(u16),
    Unsupported,
}

/// Render the output lines of one executed segment
pub fn render_output(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut html = render_text(&lines.join("\n"));
    html.push_str("<br />\n");
    html
}

/// Render an error message line
pub fn render_error(message: &str) -> String {
    format!(
        "<span class=\"error\">{}</span><br />\n",
        render_text(message)
    )
}

/// Plain HTML escaping, for echoing user input back
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_markup_escaped(&mut out, c);
    }
    out
}

/// Render a block of text through the scanner
pub fn render_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut state = State::Normal;
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        let (next, consumed) = step(&mut out, state, c, &text[pos..]);
        state = next;
        pos += consumed;
    }

    match state {
        State::InEscape { raw, span } => {
            push_raw(&mut out, &raw);
            if span.is_some() {
                out.push_str("</span>");
            }
        }
        State::InSpan(_) => out.push_str("</span>"),
        State::Normal => {}
    }
    out
}

/// Feed one char to the scanner. Returns the next state and how many bytes
/// of `rest` were consumed; zero means `c` must be scanned again.
fn step(out: &mut String, state: State, c: char, rest: &str) -> (State, usize) {
    let width = c.len_utf8();
    match state {
        State::Normal | State::InSpan(_) => {
            let span = open_span(&state);
            if c == ESC {
                return (
                    State::InEscape {
                        raw: String::from(ESC),
                        span,
                    },
                    width,
                );
            }
            if c == '&' {
                // Existing references are kept, so output that prints a
                // literal `&amp;` shows up as `&` in the browser
                if let Some(len) = char_reference_len(rest) {
                    out.push_str(&rest[..len]);
                    return (state, len);
                }
            }
            push_escaped(out, c);
            (state, width)
        }
        State::InEscape { mut raw, span } => {
            if raw.len() == 1 {
                if c == '[' {
                    raw.push(c);
                    return (State::InEscape { raw, span }, width);
                }
                // Lone ESC
                push_raw(out, &raw);
                return (rest_state(span), 0);
            }
            if c.is_ascii_digit() || c == ';' {
                raw.push(c);
                return (State::InEscape { raw, span }, width);
            }
            if c == 'm' {
                let next = match parse_sgr(&raw[2..]) {
                    Sgr::Reset => {
                        if span.is_some() {
                            out.push_str("</span>");
                        }
                        State::Normal
                    }
                    Sgr::Color(key) => {
                        if span.is_some() {
                            out.push_str("</span>");
                        }
                        out.push_str(&format!("<span class=\"color-{key}\">"));
                        State::InSpan(key)
                    }
                    Sgr::Unsupported => {
                        raw.push(c);
                        push_raw(out, &raw);
                        rest_state(span)
                    }
                };
                return (next, width);
            }
            if ('\x40'..='\x7e').contains(&c) {
                // Complete non-SGR CSI sequence (cursor movement, erase...)
                raw.push(c);
                push_raw(out, &raw);
                return (rest_state(span), width);
            }
            // Broken sequence
            push_raw(out, &raw);
            (rest_state(span), 0)
        }
    }
}

const fn open_span(state: &State) -> Option<u16> {
    match state {
        State::InSpan(key) => Some(*key),
        _ => None,
    }
}

const fn rest_state(span: Option<u16>) -> State {
    match span {
        Some(key) => State::InSpan(key),
        None => State::Normal,
    }
}

/// Interpret the parameter bytes of an `ESC[...m` sequence.
///
/// `ESC[m` and `ESC[0m` reset; `ESC[<m>m` and `ESC[<n>;<m>m` select color
/// key `m` (which must be non-zero); anything longer is unsupported.
fn parse_sgr(params: &str) -> Sgr {
    let parts: Vec<&str> = params.split(';').collect();
    match parts.as_slice() {
        [""] | ["0"] => Sgr::Reset,
        [key] | [_, key] => match key.parse::<u16>() {
            Ok(n) if n > 0 && !key.starts_with('0') => Sgr::Color(n),
            _ => Sgr::Unsupported,
        },
        _ => Sgr::Unsupported,
    }
}

fn push_markup_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#039;"),
        c => out.push(c),
    }
}

/// Escape for output text: markup characters, spaces and line breaks
fn push_escaped(out: &mut String, c: char) {
    match c {
        ' ' => out.push_str("&nbsp;"),
        '\n' => out.push_str("<br />\n"),
        '\r' => {}
        c => push_markup_escaped(out, c),
    }
}

/// Pass an unrecognized escape sequence through, escaping its printable part
fn push_raw(out: &mut String, raw: &str) {
    for c in raw.chars() {
        if c == ESC {
            out.push(c);
        } else {
            push_escaped(out, c);
        }
    }
}

/// Longest reference name accepted between `&` and `;`
const MAX_REFERENCE_NAME: usize = 32;

/// Length of a character reference (`&amp;`, `&#39;`, `&#x1F;`) at the
/// start of `s`, if there is one.
fn char_reference_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('&')?;
    // Only the bytes a reference could span are searched for the `;`
    let window = &body.as_bytes()[..body.len().min(MAX_REFERENCE_NAME + 1)];
    let end = window.iter().position(|&b| b == b';')?;
    let name = &body[..end];
    let valid = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        !hex.is_empty() && hex.len() <= 6 && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(dec) = name.strip_prefix('#') {
        !dec.is_empty() && dec.len() <= 7 && dec.chars().all(|c| c.is_ascii_digit())
    } else {
        !name.is_empty()
            && name.len() <= MAX_REFERENCE_NAME
            && name.starts_with(|c: char| c.is_ascii_alphabetic())
            && name.chars().all(|c| c.is_ascii_alphanumeric())
    };
    valid.then_some(end + 2)
}
