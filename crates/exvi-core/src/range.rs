use crate::address::{Address, AddressKind, InsertPoint};
use crate::buffer::{compile, FindFlags, TextBuffer};
use crate::cursor::{first_non_blank, Cursor};
use crate::error::{Error, Result};
use crate::register::Registers;
use crate::replace::Substitution;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Two addresses delimiting the lines an ex command acts on.
#[derive(Debug, Clone)]
pub struct AddressRange {
    begin: Address,
    end: Address,
    flags: FindFlags,
}

impl AddressRange {
    pub fn new(begin: Address, end: Address) -> Self {
        Self {
            begin,
            end,
            flags: FindFlags::default(),
        }
    }

    /// Parses `a,b`, `a`, `%` or an empty range (the current line).
    pub fn parse(range: &str) -> Self {
        let range = range.trim();
        let (begin, end) = match range {
            "" => (".", "."),
            "%" => ("1", "$"),
            _ => match split_range(range) {
                Some((b, e)) => (
                    if b.trim().is_empty() { "." } else { b },
                    if e.trim().is_empty() { "." } else { e },
                ),
                None => (range, range),
            },
        };
        Self::new(
            Address::with_kind(AddressKind::Begin, begin),
            Address::with_kind(AddressKind::End, end),
        )
    }

    /// Lines `first..=last` (1-based) fixed at construction.
    pub fn from_lines(first: usize, last: usize) -> Self {
        let mut begin = Address::with_kind(AddressKind::Begin, "");
        let mut end = Address::with_kind(AddressKind::End, "");
        begin.set_line(first);
        end.set_line(last);
        Self::new(begin, end)
    }

    /// The `'<,'>` range of the last visual selection.
    pub fn visual() -> Self {
        Self::parse("'<,'>")
    }

    pub fn with_find_flags(mut self, flags: FindFlags) -> Self {
        self.begin = self.begin.with_find_flags(flags);
        self.end = self.end.with_find_flags(flags);
        self.flags = flags;
        self
    }

    pub fn begin(&self) -> &Address {
        &self.begin
    }

    pub fn end(&self) -> &Address {
        &self.end
    }

    /// Turns the range into `count` lines starting at its last line, as in
    /// `:d 3`.
    pub fn set_count(&mut self, buffer: &dyn TextBuffer, count: usize) -> bool {
        let start = self.end.get_line(buffer);
        if start == 0 || count == 0 {
            return false;
        }
        self.begin = Address::with_kind(AddressKind::Begin, "");
        self.begin.set_line(start);
        self.end = Address::with_kind(AddressKind::End, "");
        self.end.set_line(start + count - 1);
        true
    }

    /// Resolves both ends and orders them, 1-based.
    pub(crate) fn lines(&self, buffer: &dyn TextBuffer) -> Result<(usize, usize)> {
        let begin = self.begin.resolve(buffer)?;
        let end = self.end.resolve(buffer)?;
        Ok((begin.min(end), begin.max(end)))
    }

    pub fn erase(&self, buffer: &mut dyn TextBuffer, registers: &mut Registers, name: Option<char>) -> bool {
        report("erase", self.try_erase(buffer, registers, name))
    }

    pub fn yank(&self, buffer: &dyn TextBuffer, registers: &mut Registers, name: Option<char>) -> bool {
        report("yank", self.try_yank(buffer, registers, name))
    }

    pub fn join(&self, buffer: &mut dyn TextBuffer) -> bool {
        report("join", self.try_join(buffer))
    }

    /// Runs a substitute given as `/pattern/replacement/flags`.
    pub fn substitute(&self, buffer: &mut dyn TextBuffer, registers: &mut Registers, data: &str) -> bool {
        report("substitute", self.try_substitute(buffer, registers, data).map(|_| ()))
    }

    pub fn write(&self, buffer: &dyn TextBuffer, path: &Path, append: bool) -> bool {
        report("write", self.try_write(buffer, path, append))
    }

    pub fn copy(&self, buffer: &mut dyn TextBuffer, dest: &Address) -> bool {
        report("copy", self.try_copy(buffer, dest))
    }

    pub fn move_to(&self, buffer: &mut dyn TextBuffer, dest: &Address) -> bool {
        report("move", self.try_move(buffer, dest))
    }

    /// Shifts lines right (or left) by `width` columns, `times` times.
    pub fn shift(&self, buffer: &mut dyn TextBuffer, right: bool, width: usize, times: usize) -> bool {
        report("shift", self.try_shift(buffer, right, width * times))
    }

    fn try_erase(&self, buffer: &mut dyn TextBuffer, registers: &mut Registers, name: Option<char>) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        writable(buffer)?;
        buffer.checkpoint();
        let removed = buffer.delete_lines(first - 1, last - 1).ok_or(Error::ReadOnly)?;
        registers.delete(name, &format!("{}\n", removed.join("\n")), true);
        let line = (first - 1).min(buffer.line_count() - 1);
        buffer.set_caret(Cursor::new(line, first_non_blank(buffer, line)));
        Ok(())
    }

    fn try_yank(&self, buffer: &dyn TextBuffer, registers: &mut Registers, name: Option<char>) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        let text: Vec<String> = (first - 1..last).filter_map(|l| buffer.line(l)).collect();
        registers.yank(name, &format!("{}\n", text.join("\n")), true);
        Ok(())
    }

    fn try_join(&self, buffer: &mut dyn TextBuffer) -> Result<()> {
        let (first, mut last) = self.lines(buffer)?;
        if first == last {
            last += 1;
        }
        if last > buffer.line_count() {
            return Err(Error::Unresolved("nothing to join".into()));
        }
        writable(buffer)?;

        let mut joined = buffer.line(first - 1).unwrap_or_default();
        let mut column = 0;
        for line in first..last {
            let next = buffer.line(line).unwrap_or_default();
            let trimmed = next.trim_start();
            column = joined.chars().count();
            if !trimmed.is_empty() && !joined.is_empty() && !joined.ends_with(' ') && !trimmed.starts_with(')') {
                joined.push(' ');
            }
            joined.push_str(trimmed);
        }

        buffer.checkpoint();
        buffer.delete_lines(first, last - 1).ok_or(Error::ReadOnly)?;
        buffer.set_line(first - 1, &joined);
        buffer.set_caret(Cursor::new(first - 1, column));
        Ok(())
    }

    fn try_substitute(&self, buffer: &mut dyn TextBuffer, registers: &mut Registers, data: &str) -> Result<usize> {
        let sub = Substitution::parse(data)?;
        let (first, last) = self.lines(buffer)?;
        writable(buffer)?;

        let pattern = if sub.pattern.is_empty() {
            registers
                .search()
                .map(String::from)
                .ok_or_else(|| Error::Parse("no previous pattern".into()))?
        } else {
            sub.pattern.clone()
        };
        let flags = FindFlags {
            ignore_case: sub.ignore_case.unwrap_or(self.flags.ignore_case),
            ..self.flags
        };
        let regex = compile(&pattern, flags)?;
        let expansion = sub.expansion();

        let mut changes = Vec::new();
        let mut total = 0;
        for line in first - 1..last {
            let text = buffer.line(line).unwrap_or_default();
            if let Some((new_text, count)) = sub.apply(&regex, &text, &expansion) {
                total += count;
                changes.push((line, new_text));
            }
        }
        let Some(&(last_changed, _)) = changes.last() else {
            return Err(Error::NoMatch(pattern));
        };
        registers.set_search(&pattern);

        buffer.checkpoint();
        for (line, text) in &changes {
            buffer.set_line(*line, text);
        }
        buffer.set_caret(Cursor::new(last_changed, first_non_blank(buffer, last_changed)));
        debug!(replaced = total, lines = changes.len(), "substitute");
        Ok(total)
    }

    fn try_write(&self, buffer: &dyn TextBuffer, path: &Path, append: bool) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        let mut text = String::new();
        for line in first - 1..last {
            text.push_str(&buffer.line(line).unwrap_or_default());
            text.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    fn try_copy(&self, buffer: &mut dyn TextBuffer, dest: &Address) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        let point = dest.insertion_point(buffer)?;
        writable(buffer)?;
        let lines: Vec<String> = (first - 1..last).filter_map(|l| buffer.line(l)).collect();
        let at = match point {
            InsertPoint::Start => 0,
            InsertPoint::After(line) => line,
        };
        buffer.checkpoint();
        buffer.insert_lines(at, &lines);
        buffer.set_caret(Cursor::new(at + lines.len() - 1, 0));
        Ok(())
    }

    fn try_move(&self, buffer: &mut dyn TextBuffer, dest: &Address) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        let at = match dest.insertion_point(buffer)? {
            InsertPoint::Start => 0,
            InsertPoint::After(line) => line,
        };
        if at >= first && at < last {
            return Err(Error::Parse("move destination inside range".into()));
        }
        writable(buffer)?;
        buffer.checkpoint();
        let lines = buffer.delete_lines(first - 1, last - 1).ok_or(Error::ReadOnly)?;
        let count = lines.len();
        let at = if at >= last { at - count } else { at };
        buffer.insert_lines(at, &lines);
        buffer.set_caret(Cursor::new(at + count - 1, 0));
        Ok(())
    }

    fn try_shift(&self, buffer: &mut dyn TextBuffer, right: bool, width: usize) -> Result<()> {
        let (first, last) = self.lines(buffer)?;
        writable(buffer)?;
        buffer.checkpoint();
        for line in first - 1..last {
            let text = buffer.line(line).unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            let indent = text.chars().take_while(|c| *c == ' ' || *c == '\t').count();
            let current: usize = text.chars().take(indent).map(|c| if c == '\t' { 8 } else { 1 }).sum();
            let wanted = if right { current + width } else { current.saturating_sub(width) };
            let body: String = text.chars().skip(indent).collect();
            buffer.set_line(line, &format!("{}{}", " ".repeat(wanted), body));
        }
        buffer.set_caret(Cursor::new(first - 1, first_non_blank(buffer, first - 1)));
        Ok(())
    }
}

fn writable(buffer: &dyn TextBuffer) -> Result<()> {
    if buffer.is_read_only() {
        Err(Error::ReadOnly)
    } else {
        Ok(())
    }
}

fn report(op: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e @ Error::Io(_)) => {
            warn!(op, error = %e, "range operation failed");
            false
        }
        Err(e) => {
            debug!(op, error = %e, "range operation failed");
            false
        }
    }
}

/// Splits `a,b` at the first comma outside a pattern or marker name.
fn split_range(range: &str) -> Option<(&str, &str)> {
    let mut chars = range.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            ',' => return Some((&range[..idx], &range[idx + 1..])),
            '\'' => {
                chars.next();
            }
            '/' | '?' => {
                let mut escaped = false;
                for (_, p) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if p == '\\' {
                        escaped = true;
                    } else if p == c {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    None
}
