use crate::cursor::Cursor;
use regex::{Regex, RegexBuilder};
use ropey::Rope;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flags for [`TextBuffer::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindFlags {
    pub forward: bool,
    /// Treat the pattern as a regular expression instead of plain text.
    pub regex: bool,
    pub ignore_case: bool,
    /// Continue past the buffer end (or start) back to the origin.
    pub wrap: bool,
}

impl Default for FindFlags {
    fn default() -> Self {
        Self {
            forward: true,
            regex: true,
            ignore_case: false,
            wrap: false,
        }
    }
}

/// Where the host should place a line when adjusting its window (`:z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Top,
    Bottom,
    Center,
    PreviousPage,
}

/// The editable text the core operates on.
///
/// Lines are 0-based here; the address layer converts to the 1-based ex
/// numbering. A buffer always has at least one (possibly empty) line.
/// Mutating methods must refuse to act on a read-only buffer.
pub trait TextBuffer {
    fn line_count(&self) -> usize;

    /// Text of line `idx` without its line terminator.
    fn line(&self, idx: usize) -> Option<String>;

    fn caret(&self) -> Cursor;

    fn set_caret(&mut self, cursor: Cursor);

    fn is_read_only(&self) -> bool;

    /// Inserts `text` before the character at `at`. A column past the end of
    /// the line inserts before the line terminator.
    fn insert(&mut self, at: Cursor, text: &str) -> bool;

    /// Removes the half-open span `start..end`, returning the removed text.
    /// `Cursor::new(n, 0)` for `n == line_count()` denotes the buffer end.
    fn delete(&mut self, start: Cursor, end: Cursor) -> Option<String>;

    fn marker(&self, name: char) -> Option<Cursor>;

    fn set_marker(&mut self, name: char, at: Cursor) -> bool;

    fn delete_marker(&mut self, name: char) -> bool;

    /// File name shown to macros as `$(filename)`.
    fn name(&self) -> Option<String> {
        None
    }

    /// Where `:w` and `:r` go when no file is named.
    fn path(&self) -> Option<PathBuf> {
        None
    }

    /// Annotation shown in the margin next to `line`, if the host has one.
    fn margin_text(&self, _line: usize) -> Option<String> {
        None
    }

    fn show_line(&mut self, _line: usize, _placement: Placement) {}

    /// Marks the start of an undoable change.
    fn checkpoint(&mut self) {}

    fn undo(&mut self) -> bool {
        false
    }

    fn redo(&mut self) -> bool {
        false
    }

    /// Opens a change group. Until the matching [`commit`](Self::commit),
    /// [`rollback`](Self::rollback) drops every change made since, undo
    /// history included. Groups nest.
    fn begin(&mut self) {}

    fn commit(&mut self) {}

    /// Returns false when the buffer cannot take changes back.
    fn rollback(&mut self) -> bool {
        false
    }

    fn line_len(&self, idx: usize) -> usize {
        self.line(idx).map(|l| l.chars().count()).unwrap_or(0)
    }

    fn replace(&mut self, start: Cursor, end: Cursor, text: &str) -> bool {
        if self.is_read_only() {
            return false;
        }
        self.delete(start, end).is_some() && self.insert(start, text)
    }

    /// Text of the half-open span `start..end`.
    fn text_range(&self, start: Cursor, end: Cursor) -> String {
        let mut out = String::new();
        for line in start.line..=end.line.min(self.line_count().saturating_sub(1)) {
            let text = self.line(line).unwrap_or_default();
            let from = if line == start.line { start.column } else { 0 };
            if line == end.line {
                out.extend(text.chars().skip(from).take(end.column.saturating_sub(from)));
            } else {
                out.extend(text.chars().skip(from));
                out.push('\n');
            }
        }
        out
    }

    /// Inserts whole lines so that the first of them becomes line `before`.
    fn insert_lines(&mut self, before: usize, lines: &[String]) -> bool {
        if lines.is_empty() {
            return true;
        }
        let joined = lines.join("\n");
        if before < self.line_count() {
            self.insert(Cursor::new(before, 0), &format!("{joined}\n"))
        } else {
            let last = self.line_count().saturating_sub(1);
            let end = self.line_len(last);
            self.insert(Cursor::new(last, end), &format!("\n{joined}"))
        }
    }

    /// Removes lines `first..=last`, returning their text.
    fn delete_lines(&mut self, first: usize, last: usize) -> Option<Vec<String>> {
        if self.is_read_only() || first > last || last >= self.line_count() {
            return None;
        }
        let removed: Vec<String> = (first..=last).filter_map(|l| self.line(l)).collect();
        let done = if last + 1 < self.line_count() {
            self.delete(Cursor::new(first, 0), Cursor::new(last + 1, 0))
        } else if first > 0 {
            let prev = first - 1;
            self.delete(
                Cursor::new(prev, self.line_len(prev)),
                Cursor::new(last, self.line_len(last)),
            )
        } else {
            self.delete(Cursor::new(0, 0), Cursor::new(last, self.line_len(last)))
        };
        done.map(|_| removed)
    }

    fn set_line(&mut self, idx: usize, text: &str) -> bool {
        let len = self.line_len(idx);
        self.replace(Cursor::new(idx, 0), Cursor::new(idx, len), text)
    }

    /// Searches for `pattern` starting at `from`. Forward searches match at or
    /// after `from`; backward searches match strictly before it.
    fn find(&self, pattern: &str, from: Cursor, flags: FindFlags) -> Option<Cursor> {
        let regex = search_regex(pattern, flags)?;
        find_with(&regex, from, flags, self.line_count(), |l| self.line(l))
    }

    /// Like [`find`](Self::find), but matches against margin text and
    /// returns the line found.
    fn find_margin(&self, pattern: &str, from: usize, flags: FindFlags) -> Option<usize> {
        let regex = search_regex(pattern, flags)?;
        let start = Cursor::new(from, 0);
        find_with(&regex, start, flags, self.line_count(), |l| self.margin_text(l))
            .map(|c| c.line)
    }
}

pub(crate) fn compile(pattern: &str, flags: FindFlags) -> crate::error::Result<Regex> {
    let source = if flags.regex {
        pattern.to_string()
    } else {
        regex::escape(pattern)
    };
    Ok(RegexBuilder::new(&source)
        .case_insensitive(flags.ignore_case)
        .build()?)
}

fn search_regex(pattern: &str, flags: FindFlags) -> Option<Regex> {
    compile(pattern, flags)
        .map_err(|e| debug!(pattern, error = %e, "invalid search pattern"))
        .ok()
}

fn match_columns(regex: &Regex, text: &str) -> Vec<usize> {
    regex
        .find_iter(text)
        .map(|m| text[..m.start()].chars().count())
        .collect()
}

fn find_with<F>(regex: &Regex, from: Cursor, flags: FindFlags, count: usize, text: F) -> Option<Cursor>
where
    F: Fn(usize) -> Option<String>,
{
    if count == 0 {
        return None;
    }
    let cols = |line: usize| text(line).map(|t| match_columns(regex, &t)).unwrap_or_default();

    if flags.forward {
        if let Some(&col) = cols(from.line).iter().find(|&&c| c >= from.column) {
            return Some(Cursor::new(from.line, col));
        }
        for line in from.line + 1..count {
            if let Some(&col) = cols(line).first() {
                return Some(Cursor::new(line, col));
            }
        }
        if flags.wrap {
            for line in 0..=from.line.min(count - 1) {
                let found = cols(line);
                let hit = if line == from.line {
                    found.into_iter().find(|&c| c < from.column)
                } else {
                    found.first().copied()
                };
                if let Some(col) = hit {
                    return Some(Cursor::new(line, col));
                }
            }
        }
    } else {
        if let Some(&col) = cols(from.line).iter().rev().find(|&&c| c < from.column) {
            return Some(Cursor::new(from.line, col));
        }
        for line in (0..from.line.min(count)).rev() {
            if let Some(&col) = cols(line).last() {
                return Some(Cursor::new(line, col));
            }
        }
        if flags.wrap {
            for line in (from.line..count).rev() {
                let found = cols(line);
                let hit = if line == from.line {
                    found.into_iter().rev().find(|&c| c >= from.column)
                } else {
                    found.last().copied()
                };
                if let Some(col) = hit {
                    return Some(Cursor::new(line, col));
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone)]
struct Snapshot {
    rope: Rope,
    caret: Cursor,
    markers: HashMap<char, Cursor>,
}

/// Rope-backed [`TextBuffer`] with markers and snapshot undo.
#[derive(Debug, Clone, Default)]
pub struct RopeBuffer {
    rope: Rope,
    file_path: Option<PathBuf>,
    read_only: bool,
    caret: Cursor,
    markers: HashMap<char, Cursor>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    groups: Vec<Group>,
}

/// Buffer state at [`TextBuffer::begin`].
#[derive(Debug, Clone)]
struct Group {
    snapshot: Snapshot,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl RopeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self {
            rope: Rope::from_str(&content),
            file_path: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn set_file_path(&mut self, path: PathBuf) {
        self.file_path = Some(path);
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    fn char_idx(&self, at: Cursor) -> usize {
        if at.line >= self.line_count() {
            return self.rope.len_chars();
        }
        self.rope.line_to_char(at.line) + at.column.min(self.line_len(at.line))
    }

    fn shift_markers_insert(&mut self, at: Cursor, added: usize) {
        if added == 0 {
            return;
        }
        for mark in self.markers.values_mut() {
            if mark.line > at.line || (mark.line == at.line && mark.column >= at.column) {
                mark.line += added;
            }
        }
    }

    fn shift_markers_delete(&mut self, start: Cursor, end: Cursor) {
        let removed = end.line - start.line;
        if removed == 0 {
            return;
        }
        let whole_lines = start.column == 0 && end.column == 0;
        self.markers.retain(|_, mark| {
            !(whole_lines && mark.line >= start.line && mark.line < end.line)
        });
        for mark in self.markers.values_mut() {
            if mark.line >= end.line && (whole_lines || mark.line > end.line) {
                mark.line -= removed;
            } else if mark.line > start.line {
                *mark = start;
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            rope: self.rope.clone(),
            caret: self.caret,
            markers: self.markers.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.rope = snapshot.rope;
        self.caret = snapshot.caret;
        self.markers = snapshot.markers;
    }
}

impl TextBuffer for RopeBuffer {
    fn line_count(&self) -> usize {
        let lines = self.rope.len_lines();
        let len = self.rope.len_chars();
        if len > 0 && self.rope.char(len - 1) == '\n' {
            lines - 1
        } else {
            lines
        }
    }

    fn line(&self, idx: usize) -> Option<String> {
        if idx >= self.line_count() {
            return None;
        }
        let text = self.rope.line(idx).to_string();
        let text = text.strip_suffix('\n').unwrap_or(&text);
        Some(text.strip_suffix('\r').unwrap_or(text).to_string())
    }

    fn caret(&self) -> Cursor {
        self.caret
    }

    fn set_caret(&mut self, cursor: Cursor) {
        self.caret = cursor;
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn insert(&mut self, at: Cursor, text: &str) -> bool {
        if self.read_only {
            return false;
        }
        let idx = self.char_idx(at);
        self.rope.insert(idx, text);
        self.shift_markers_insert(at, text.matches('\n').count());
        true
    }

    fn delete(&mut self, start: Cursor, end: Cursor) -> Option<String> {
        if self.read_only {
            return None;
        }
        let (from, to) = (self.char_idx(start), self.char_idx(end));
        if from >= to {
            return Some(String::new());
        }
        let removed = self.rope.slice(from..to).to_string();
        self.rope.remove(from..to);
        self.shift_markers_delete(start, end.max(start));
        Some(removed)
    }

    fn marker(&self, name: char) -> Option<Cursor> {
        self.markers.get(&name).copied()
    }

    fn set_marker(&mut self, name: char, at: Cursor) -> bool {
        if at.line >= self.line_count() {
            return false;
        }
        self.markers.insert(name, at);
        true
    }

    fn delete_marker(&mut self, name: char) -> bool {
        self.markers.remove(&name).is_some()
    }

    fn name(&self) -> Option<String> {
        self.file_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    fn path(&self) -> Option<PathBuf> {
        self.file_path.clone()
    }

    fn checkpoint(&mut self) {
        let snapshot = self.snapshot();
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
    }

    fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(snapshot) => {
                self.redo_stack.push(self.snapshot());
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(snapshot) => {
                self.undo_stack.push(self.snapshot());
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn begin(&mut self) {
        self.groups.push(Group {
            snapshot: self.snapshot(),
            undo_stack: self.undo_stack.clone(),
            redo_stack: self.redo_stack.clone(),
        });
    }

    fn commit(&mut self) {
        self.groups.pop();
    }

    fn rollback(&mut self) -> bool {
        let Some(group) = self.groups.pop() else {
            return false;
        };
        self.restore(group.snapshot);
        self.undo_stack = group.undo_stack;
        self.redo_stack = group.redo_stack;
        true
    }
}
