//! Helpers for keeping player-supplied text on one log line.

use std::fmt::Write;

const MAX_LOGGED_CHARS: usize = 256;

/// Escape control characters (`\n`, `\r`, `\t`, other controls as `\xNN`) and
/// backslashes, capping the output at a fixed number of source characters.
pub fn escape_log(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_LOGGED_CHARS) + 4);
    for (idx, ch) in text.chars().enumerate() {
        if idx == MAX_LOGGED_CHARS {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Chat lines are logged with color codes removed as well as escaped.
pub fn chat_log_line(text: &str) -> String {
    escape_log(&crate::validation::strip_colors(text))
}
