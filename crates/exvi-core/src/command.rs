//! Command text and the prefix parsing shared by the dispatcher and the
//! macro engine.

use crate::register::Registers;

/// Counts above this are clamped; nothing useful repeats more often.
pub const MAX_COUNT: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `=expr`: integer calculation.
    Calc,
    /// `:cmd`: ex command line.
    Command,
    /// `!cmd`: handed to the host.
    Exec,
    /// `/pat` or `?pat` searching the text.
    Find,
    /// `/pat` or `?pat` while the command targets the margin.
    FindMargin,
    /// Bare keystrokes.
    Vi,
    None,
}

/// Which component of the host view a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Text,
    Margin,
}

/// The command being dispatched, with its classification and target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    text: String,
    target: Option<Target>,
    original: Option<Target>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self.text.chars().next() {
            None => CommandKind::None,
            Some(':') => CommandKind::Command,
            Some('=') => CommandKind::Calc,
            Some('!') => CommandKind::Exec,
            Some('/') | Some('?') if self.target == Some(Target::Margin) => CommandKind::FindMargin,
            Some('/') | Some('?') => CommandKind::Find,
            Some(_) => CommandKind::Vi,
        }
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn target(&self) -> Target {
        self.target.unwrap_or_default()
    }

    /// Retargets the command, remembering the previous target so a detour
    /// (such as a margin find) can be undone with [`restore`](Self::restore).
    pub fn set_target(&mut self, target: Target) {
        if self.original.is_none() {
            self.original = Some(self.target());
        }
        self.target = Some(target);
    }

    pub fn restore(&mut self) {
        if let Some(original) = self.original.take() {
            self.target = Some(original);
        }
    }
}

/// The `{count}{"register}{count}` prefix of a vi command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix<'a> {
    pub count: Option<usize>,
    pub register: Option<char>,
    pub body: &'a str,
}

impl Prefix<'_> {
    pub fn count_or_one(&self) -> usize {
        self.count.unwrap_or(1)
    }
}

/// Splits a leading decimal count. A lone `0` is a motion, not a count.
pub fn parse_count(text: &str) -> (Option<usize>, &str) {
    if !text.starts_with(|c: char| matches!(c, '1'..='9')) {
        return (None, text);
    }
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let count = text[..end].parse::<usize>().map_or(MAX_COUNT, |n| n.min(MAX_COUNT));
    (Some(count), &text[end..])
}

/// Combines two optional counts multiplicatively, as in `2d3w`.
pub fn combine_counts(outer: Option<usize>, inner: Option<usize>) -> Option<usize> {
    match (outer, inner) {
        (Some(a), Some(b)) => Some(a.saturating_mul(b).min(MAX_COUNT)),
        (a, b) => a.or(b),
    }
}

/// Parses `{count}{"x}{count}`. Returns `None` when a register selector is
/// incomplete or names no register.
pub fn parse_prefix(text: &str) -> Option<Prefix<'_>> {
    let (count, rest) = parse_count(text);
    let Some(after_quote) = rest.strip_prefix('"') else {
        return Some(Prefix {
            count,
            register: None,
            body: rest,
        });
    };
    let register = after_quote.chars().next()?;
    if !Registers::is_valid(register) {
        return None;
    }
    let (inner, body) = parse_count(&after_quote[register.len_utf8()..]);
    Some(Prefix {
        count: combine_counts(count, inner),
        register: Some(register),
        body,
    })
}
