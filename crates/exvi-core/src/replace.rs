//! Substitute command parsing and per-line replacement.
//!
//! Accepted forms (the delimiter is whatever follows `s`):
//! - `/old/new` - first match on each line
//! - `/old/new/g` - every match on each line
//! - `/old/new/i` - ignore case, `I` forces case-sensitive matching
//!
//! The replacement understands `&` (whole match), `\1`-`\9` (groups) and
//! `\&` for a literal ampersand.

use crate::error::{Error, Result};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Empty means "reuse the last search pattern".
    pub pattern: String,
    pub replacement: String,
    pub global: bool,
    pub ignore_case: Option<bool>,
}

impl Substitution {
    pub fn parse(data: &str) -> Result<Self> {
        let mut chars = data.chars();
        let delimiter = chars
            .next()
            .filter(|c| !c.is_alphanumeric() && *c != '\\' && *c != ' ')
            .ok_or_else(|| Error::Parse(format!("substitute: {data}")))?;

        let mut parts = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        for c in chars {
            if escaped {
                if c != delimiter {
                    current.push('\\');
                }
                current.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delimiter && parts.len() < 2 {
                parts.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }
        if escaped {
            current.push('\\');
        }
        parts.push(current);

        let pattern = parts.first().cloned().unwrap_or_default();
        let replacement = parts.get(1).cloned().unwrap_or_default();
        let flags = parts.get(2).map(String::as_str).unwrap_or("");

        let mut sub = Self {
            pattern,
            replacement,
            global: false,
            ignore_case: None,
        };
        for flag in flags.trim().chars() {
            match flag {
                'g' => sub.global = true,
                'i' => sub.ignore_case = Some(true),
                'I' => sub.ignore_case = Some(false),
                'c' | '&' => {}
                _ => return Err(Error::Parse(format!("substitute flag: {flag}"))),
            }
        }
        Ok(sub)
    }

    /// Replacement rewritten into the `regex` crate's `$` syntax.
    pub fn expansion(&self) -> String {
        let mut out = String::new();
        let mut chars = self.replacement.chars();
        while let Some(c) = chars.next() {
            match c {
                '&' => out.push_str("${0}"),
                '$' => out.push_str("$$"),
                '\\' => match chars.next() {
                    Some(d @ '0'..='9') => {
                        out.push_str("${");
                        out.push(d);
                        out.push('}');
                    }
                    Some('$') => out.push_str("$$"),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                },
                _ => out.push(c),
            }
        }
        out
    }

    /// Replaces in one line, returning the new text and the number of
    /// replacements, or `None` if nothing matched.
    pub fn apply(&self, regex: &Regex, line: &str, expansion: &str) -> Option<(String, usize)> {
        let count = if self.global {
            regex.find_iter(line).count()
        } else {
            usize::from(regex.is_match(line))
        };
        if count == 0 {
            return None;
        }
        let text = if self.global {
            regex.replace_all(line, expansion)
        } else {
            regex.replacen(line, 1, expansion)
        };
        Some((text.into_owned(), count))
    }
}
