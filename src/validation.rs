//! Guild name, prefix and blacklist validation plus color-code helpers.
//!
//! Names may carry `&`-style color codes (`&6Knights`). Lookups and uniqueness
//! checks always compare the color-stripped form.

use log::warn;
use regex::Regex;

use crate::config::GuildSettings;
use crate::errors::GuildError;

const COLOR_CHAR: char = '\u{00A7}';
const ALT_COLOR_CHAR: char = '&';

fn is_color_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r' | 'x')
}

/// Translate `&x` color codes into their section-sign form.
pub fn colorize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ALT_COLOR_CHAR {
            if let Some(&next) = chars.peek() {
                if is_color_code(next) {
                    out.push(COLOR_CHAR);
                    out.push(next.to_ascii_lowercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// Remove every color code, whether written with `&` or the section sign.
pub fn strip_colors(text: &str) -> String {
    let colored = colorize(text);
    let mut out = String::with_capacity(colored.len());
    let mut chars = colored.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == COLOR_CHAR {
            if let Some(&next) = chars.peek() {
                if is_color_code(next) {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn full_match(pattern: &str) -> Result<Regex, GuildError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| GuildError::ConfigParse(format!("invalid pattern '{}': {}", pattern, e)))
}

/// Compiled name/prefix requirements and the configured blacklist.
#[derive(Debug, Clone)]
pub struct NameValidator {
    name_pattern: Regex,
    prefix_pattern: Regex,
    include_color_codes: bool,
    blacklist: Vec<String>,
    blacklist_case_sensitive: bool,
}

impl NameValidator {
    pub fn from_settings(settings: &GuildSettings) -> Result<Self, GuildError> {
        Ok(Self {
            name_pattern: full_match(&settings.name_requirements)?,
            prefix_pattern: full_match(&settings.prefix_requirements)?,
            include_color_codes: settings.include_color_codes,
            blacklist: settings
                .blacklist_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            blacklist_case_sensitive: settings.blacklist_case_sensitive,
        })
    }

    fn candidate(&self, text: &str) -> String {
        if self.include_color_codes {
            text.to_string()
        } else {
            strip_colors(text)
        }
    }

    /// True when `name` satisfies the configured name pattern.
    pub fn name_check(&self, name: &str) -> bool {
        self.name_pattern.is_match(&self.candidate(name))
    }

    /// True when `prefix` satisfies the configured prefix pattern.
    pub fn prefix_check(&self, prefix: &str) -> bool {
        self.prefix_pattern.is_match(&self.candidate(prefix))
    }

    /// True when `name` is blacklisted.
    ///
    /// With `blacklist_case_sensitive` off any word occurring anywhere in the
    /// name (ignoring case) rejects it. With it on only a whole-name match
    /// (still ignoring case) rejects it.
    pub fn blacklist_check(&self, name: &str) -> bool {
        let lowered = strip_colors(name).to_lowercase();
        let hit = if self.blacklist_case_sensitive {
            self.blacklist.iter().any(|w| *w == lowered)
        } else {
            self.blacklist
                .iter()
                .any(|w| !w.is_empty() && lowered.contains(w.as_str()))
        };
        if hit {
            warn!(target: "security", "Blacklisted guild name rejected: {}", name);
        }
        hit
    }
}
