//! Ex line addresses.
//!
//! An address expression is a sum of terms:
//!
//! ```text
//! expr := term (('+' | '-') term)*
//! term := integer | '.' | '$' | "'" marker | '/' pattern '/' | '?' pattern '?'
//! ```
//!
//! Resolved lines are 1-based and clamped to the buffer; 0 means the
//! address could not be resolved.

use crate::buffer::{FindFlags, Placement, TextBuffer};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::register::Registers;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressKind {
    Begin,
    End,
    #[default]
    Single,
}

/// Where lines are inserted by `append`, `put` and `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Before the first line, written as address `0`.
    Start,
    /// After the given 1-based line.
    After(usize),
}

impl InsertPoint {
    /// 0-based index the first inserted line will get.
    fn index(self) -> usize {
        match self {
            InsertPoint::Start => 0,
            InsertPoint::After(line) => line,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Address {
    kind: AddressKind,
    expr: String,
    line: usize,
    flags: FindFlags,
}

impl Address {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(kind: AddressKind, expr: impl Into<String>) -> Self {
        Self {
            kind,
            ..Self::new(expr)
        }
    }

    /// Case and regex flags for pattern terms. Wrapping is never applied.
    pub fn with_find_flags(mut self, flags: FindFlags) -> Self {
        self.flags = FindFlags { wrap: false, ..flags };
        self
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Binds an empty expression to a line chosen by the owning range.
    pub(crate) fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    /// Resolved 1-based line, or 0 when the expression cannot be resolved.
    pub fn get_line(&self, buffer: &dyn TextBuffer) -> usize {
        self.resolve(buffer).unwrap_or_else(|e| {
            debug!(expr = %self.expr, error = %e, "address not resolved");
            0
        })
    }

    pub(crate) fn resolve(&self, buffer: &dyn TextBuffer) -> Result<usize> {
        let count = buffer.line_count();
        let expr = self.expr.trim();
        let sum = if expr.is_empty() {
            if self.line == 0 {
                return Err(Error::Unresolved("empty address".into()));
            }
            self.line as i64
        } else {
            Parser::new(expr, buffer, self.flags).sum()?
        };
        Ok(sum.clamp(1, count.max(1) as i64) as usize)
    }

    pub(crate) fn insertion_point(&self, buffer: &dyn TextBuffer) -> Result<InsertPoint> {
        if self.expr.trim() == "0" {
            return Ok(InsertPoint::Start);
        }
        self.resolve(buffer).map(InsertPoint::After)
    }

    /// Sets marker `name` on the resolved line.
    pub fn marker_add(&self, buffer: &mut dyn TextBuffer, name: char) -> bool {
        let line = self.get_line(buffer);
        if line == 0 {
            return false;
        }
        let caret = buffer.caret();
        let at = if caret.line == line - 1 {
            caret
        } else {
            Cursor::new(line - 1, 0)
        };
        buffer.set_marker(name, at)
    }

    /// Removes the marker this address refers to (`'x`). Addresses that are
    /// not a marker reference leave every marker alone and return false.
    pub fn marker_delete(&self, buffer: &mut dyn TextBuffer) -> bool {
        let mut chars = self.expr.trim().chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('\''), Some(name), None) => buffer.delete_marker(name),
            _ => false,
        }
    }

    /// Asks the host to scroll the resolved line into view; `flags` is one of
    /// `""`, `+`, `-`, `^`, `=`, `.` optionally followed by `#`.
    pub fn adjust_window(&self, buffer: &mut dyn TextBuffer, flags: &str) -> bool {
        let kind = flags.strip_suffix('#').unwrap_or(flags);
        let placement = match kind {
            "" | "+" => Placement::Top,
            "-" => Placement::Bottom,
            "." | "=" => Placement::Center,
            "^" => Placement::PreviousPage,
            _ => return false,
        };
        let line = self.get_line(buffer);
        if line == 0 {
            return false;
        }
        buffer.show_line(line - 1, placement);
        true
    }

    /// Inserts `text` as lines above the resolved line.
    pub fn insert(&self, buffer: &mut dyn TextBuffer, text: &str) -> bool {
        self.insert_at(buffer, text, |line| InsertPoint::After(line - 1))
    }

    /// Inserts `text` as lines below the resolved line (`0`: at the top).
    pub fn append(&self, buffer: &mut dyn TextBuffer, text: &str) -> bool {
        self.insert_at(buffer, text, |line| InsertPoint::After(line))
    }

    /// Puts register `name` below the resolved line.
    pub fn put(&self, buffer: &mut dyn TextBuffer, registers: &Registers, name: char) -> bool {
        match registers.get(name) {
            Some(reg) => {
                let text = reg.lines().join("\n");
                self.append(buffer, &text)
            }
            None => {
                debug!(register = %name, "put from empty register");
                false
            }
        }
    }

    /// Reads the file at `path` below the resolved line.
    pub fn read(&self, buffer: &mut dyn TextBuffer, path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(text) => self.append(buffer, text.strip_suffix('\n').unwrap_or(&text)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "read failed");
                false
            }
        }
    }

    fn insert_at<F>(&self, buffer: &mut dyn TextBuffer, text: &str, point: F) -> bool
    where
        F: Fn(usize) -> InsertPoint,
    {
        if buffer.is_read_only() {
            debug!("insert refused on read-only buffer");
            return false;
        }
        let at = match self.insertion_point(buffer) {
            Ok(InsertPoint::After(line)) => point(line),
            Ok(InsertPoint::Start) => InsertPoint::Start,
            Err(e) => {
                debug!(expr = %self.expr, error = %e, "address not resolved");
                return false;
            }
        };
        let lines: Vec<String> = text.split('\n').map(String::from).collect();
        buffer.checkpoint();
        buffer.insert_lines(at.index(), &lines)
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    buffer: &'a dyn TextBuffer,
    flags: FindFlags,
}

impl<'a> Parser<'a> {
    fn new(expr: &str, buffer: &'a dyn TextBuffer, flags: FindFlags) -> Self {
        Self {
            chars: expr.chars().collect(),
            pos: 0,
            buffer,
            flags,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn current(&self) -> i64 {
        self.buffer.caret().line as i64 + 1
    }

    fn sum(&mut self) -> Result<i64> {
        let mut total: Option<i64> = None;
        loop {
            self.skip_blanks();
            let Some(c) = self.peek() else { break };
            match c {
                '+' | '-' => {
                    self.pos += 1;
                    let base = total.unwrap_or_else(|| self.current());
                    self.skip_blanks();
                    let operand = match self.peek() {
                        None | Some('+') | Some('-') => 1,
                        Some(_) => self.term()?,
                    };
                    total = Some(if c == '+' {
                        base.saturating_add(operand)
                    } else {
                        base.saturating_sub(operand)
                    });
                }
                d if d.is_ascii_digit() && total.is_some() => {
                    let n = self.number();
                    total = total.map(|t| t.saturating_add(n));
                }
                _ if total.is_none() => total = Some(self.term()?),
                _ => return Err(Error::Parse(self.chars.iter().collect())),
            }
        }
        total.ok_or_else(|| Error::Unresolved("empty address".into()))
    }

    fn number(&mut self) -> i64 {
        let mut n: i64 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            n = n.saturating_mul(10).saturating_add(d as i64);
            self.pos += 1;
        }
        n
    }

    fn term(&mut self) -> Result<i64> {
        let c = self.peek().ok_or_else(|| Error::Parse("missing term".into()))?;
        match c {
            '0'..='9' => Ok(self.number()),
            '.' => {
                self.pos += 1;
                Ok(self.current())
            }
            '$' => {
                self.pos += 1;
                Ok(self.buffer.line_count() as i64)
            }
            '\'' => {
                self.pos += 1;
                let name = self.peek().ok_or_else(|| Error::Parse("missing marker".into()))?;
                self.pos += 1;
                self.buffer
                    .marker(name)
                    .map(|m| m.line as i64 + 1)
                    .ok_or(Error::UnknownMarker(name))
            }
            '/' | '?' => {
                self.pos += 1;
                let pattern = self.pattern(c);
                let flags = FindFlags {
                    forward: c == '/',
                    ..self.flags
                };
                self.buffer
                    .find(&pattern, self.buffer.caret(), flags)
                    .map(|m| m.line as i64 + 1)
                    .ok_or(Error::NoMatch(pattern))
            }
            _ => Err(Error::Parse(self.chars.iter().collect())),
        }
    }

    /// Reads up to the closing delimiter; `\` escapes the delimiter.
    fn pattern(&mut self, delimiter: char) -> String {
        let mut pattern = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == delimiter {
                break;
            }
            if c == '\\' && self.peek() == Some(delimiter) {
                pattern.push(delimiter);
                self.pos += 1;
            } else {
                pattern.push(c);
            }
        }
        pattern
    }
}
