//! Ex command lines: `[range]verb[args]`.
//!
//! The range is handed to [`AddressRange`]; verbs may be abbreviated down
//! to the short form listed in the table below.

use crate::address::Address;
use crate::buffer::{FindFlags, TextBuffer};
use crate::cursor::{first_non_blank, Cursor};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::range::AddressRange;
use crate::register::Registers;
use crate::vi::Vi;
use std::path::PathBuf;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// No verb: move to the last line of the range.
    Goto,
    Delete,
    Yank,
    Join,
    Substitute,
    /// `&`: the last substitute again.
    Resubstitute,
    Write,
    Read,
    Put,
    Insert,
    Append,
    Mark,
    DeleteMarks,
    /// `z`: scroll the window around a line.
    Window,
    Copy,
    Move,
    /// `>` or `<`, repeated for wider shifts.
    Shift { right: bool, times: usize },
    /// `=`: line number of the range end, into register `=`.
    LineNumber,
    Set,
}

/// Full name, shortest accepted abbreviation and verb.
const VERBS: [(&str, usize, Verb); 17] = [
    ("delete", 1, Verb::Delete),
    ("delmarks", 4, Verb::DeleteMarks),
    ("yank", 1, Verb::Yank),
    ("join", 1, Verb::Join),
    ("substitute", 1, Verb::Substitute),
    ("set", 2, Verb::Set),
    ("write", 1, Verb::Write),
    ("read", 1, Verb::Read),
    ("put", 2, Verb::Put),
    ("insert", 1, Verb::Insert),
    ("append", 1, Verb::Append),
    ("k", 1, Verb::Mark),
    ("mark", 2, Verb::Mark),
    ("move", 1, Verb::Move),
    ("copy", 2, Verb::Copy),
    ("t", 1, Verb::Copy),
    ("z", 1, Verb::Window),
];

/// A parsed ex command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExCommand {
    pub range: String,
    pub verb: Verb,
    pub args: String,
}

impl ExCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_start();
        let split = range_len(line);
        let range = line[..split].trim().to_string();
        let rest = line[split..].trim_start();

        let mut chars = rest.chars();
        let (verb, args) = match chars.next() {
            None => (Verb::Goto, ""),
            Some('&') => (Verb::Resubstitute, chars.as_str()),
            Some('=') => (Verb::LineNumber, chars.as_str()),
            Some(c @ ('>' | '<')) => {
                let times = rest.chars().take_while(|&s| s == c).count();
                (Verb::Shift { right: c == '>', times }, &rest[times..])
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let end = rest.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(rest.len());
                let (name, args) = rest.split_at(end);
                match lookup(name) {
                    Some(verb) => (verb, args),
                    // `:ka` marks without a space
                    None if name.len() == 2 && name.starts_with('k') => (Verb::Mark, &rest[1..]),
                    None => return Err(Error::Parse(format!("unknown command: {name}"))),
                }
            }
            Some(c) => return Err(Error::Parse(format!("unexpected '{c}'"))),
        };
        let args = if verb == Verb::Substitute { args } else { args.trim() };
        Ok(Self {
            range,
            verb,
            args: args.to_string(),
        })
    }
}

fn lookup(name: &str) -> Option<Verb> {
    VERBS
        .iter()
        .find(|(full, min, _)| name.len() >= *min && full.starts_with(name))
        .map(|(_, _, verb)| *verb)
}

/// Length of the range prefix of `line`.
fn range_len(line: &str) -> usize {
    let mut chars = line.char_indices().peekable();
    while let Some(&(idx, c)) = chars.peek() {
        match c {
            '0'..='9' | '.' | '$' | '%' | ',' | '+' | '-' | ' ' | '\t' => {
                chars.next();
            }
            '\'' => {
                chars.next();
                chars.next();
            }
            '/' | '?' => {
                chars.next();
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
            _ => return idx,
        }
    }
    line.len()
}

/// Splits an optional register name and count, as in `:d a 3`.
fn register_and_count(args: &str) -> Result<(Option<char>, Option<usize>)> {
    let args = args.trim();
    let mut chars = args.chars();
    let register = match chars.next() {
        Some(c) if !c.is_ascii_digit() => {
            if !Registers::is_valid(c) {
                return Err(Error::Parse(format!("invalid register: {c}")));
            }
            Some(c)
        }
        _ => None,
    };
    let rest = if register.is_some() { chars.as_str().trim() } else { args };
    let count = match rest {
        "" => None,
        n => Some(
            n.parse::<usize>()
                .map_err(|_| Error::Parse(format!("invalid count: {n}")))?,
        ),
    };
    Ok((register, count))
}

fn check(done: bool, what: &'static str) -> Result<()> {
    if done {
        Ok(())
    } else {
        Err(Error::Failed(what))
    }
}

impl<B: TextBuffer> Vi<B> {
    /// Runs an ex command line (without the leading `:`). On success the
    /// line is stored in register `:`.
    pub(crate) fn ex_command(&mut self, registers: &mut Registers, line: &str) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        let result = ExCommand::parse(line).and_then(|ex| {
            trace!(?ex, "ex command");
            self.run_ex(registers, &ex)
        });
        match result {
            Ok(()) => {
                registers.set(':', line, false);
                true
            }
            Err(e) => {
                debug!(line, error = %e, "ex command failed");
                false
            }
        }
    }

    fn run_ex(&mut self, registers: &mut Registers, ex: &ExCommand) -> Result<()> {
        let flags = FindFlags {
            wrap: false,
            ..self.options.find_flags(true)
        };
        let range_text = match ex.verb {
            Verb::Write if ex.range.is_empty() => "%",
            _ => ex.range.as_str(),
        };
        let mut range = AddressRange::parse(range_text).with_find_flags(flags);
        let at = range.end().clone();

        match ex.verb {
            Verb::Goto => {
                if ex.range.is_empty() {
                    return Ok(());
                }
                let line = at.resolve(&self.buffer)? - 1;
                let caret = self.buffer.caret();
                self.buffer.set_marker('\'', caret);
                self.buffer
                    .set_caret(Cursor::new(line, first_non_blank(&self.buffer, line)));
                Ok(())
            }
            Verb::Delete | Verb::Yank => {
                let (register, count) = register_and_count(&ex.args)?;
                if let Some(count) = count {
                    check(range.set_count(&self.buffer, count), "count")?;
                }
                if ex.verb == Verb::Delete {
                    check(range.erase(&mut self.buffer, registers, register), "delete")
                } else {
                    check(range.yank(&self.buffer, registers, register), "yank")
                }
            }
            Verb::Join => {
                let (_, count) = register_and_count(&ex.args)?;
                if let Some(count) = count {
                    check(range.set_count(&self.buffer, count), "count")?;
                }
                let (first, mut last) = range.lines(&self.buffer)?;
                if first == last {
                    last = first + 1;
                }
                if last > self.buffer.line_count() {
                    return Err(Error::Failed("join"));
                }
                check(AddressRange::from_lines(first, last).join(&mut self.buffer), "join")
            }
            Verb::Substitute => {
                let data = if ex.args.trim().is_empty() {
                    self.last_substitute.clone().ok_or(Error::Failed("substitute"))?
                } else {
                    ex.args.clone()
                };
                check(range.substitute(&mut self.buffer, registers, &data), "substitute")?;
                self.last_substitute = Some(data);
                Ok(())
            }
            Verb::Resubstitute => {
                let data = self.last_substitute.clone().ok_or(Error::Failed("substitute"))?;
                check(range.substitute(&mut self.buffer, registers, &data), "substitute")
            }
            Verb::Write => {
                let (append, name) = match ex.args.strip_prefix(">>") {
                    Some(name) => (true, name.trim()),
                    None => (false, ex.args.as_str()),
                };
                let path = self.file_argument(name)?;
                check(range.write(&self.buffer, &path, append), "write")
            }
            Verb::Read => {
                let path = self.file_argument(&ex.args)?;
                check(at.read(&mut self.buffer, &path), "read")
            }
            Verb::Put => {
                let (register, _) = register_and_count(&ex.args)?;
                check(at.put(&mut self.buffer, registers, register.unwrap_or('"')), "put")
            }
            Verb::Insert | Verb::Append => {
                if ex.args.is_empty() {
                    return Err(Error::Parse("missing text".into()));
                }
                if ex.verb == Verb::Insert {
                    check(at.insert(&mut self.buffer, &ex.args), "insert")
                } else {
                    check(at.append(&mut self.buffer, &ex.args), "append")
                }
            }
            Verb::Mark => {
                let name = single_char(&ex.args)?;
                check(at.marker_add(&mut self.buffer, name), "mark")
            }
            Verb::DeleteMarks => {
                let names: Vec<char> = ex.args.chars().filter(|c| !c.is_whitespace()).collect();
                if names.is_empty() {
                    return Err(Error::Parse("missing marker name".into()));
                }
                if let Some(&missing) = names.iter().find(|&&c| self.buffer.marker(c).is_none()) {
                    return Err(Error::UnknownMarker(missing));
                }
                for name in names {
                    Address::new(format!("'{name}")).marker_delete(&mut self.buffer);
                }
                Ok(())
            }
            Verb::Window => check(at.adjust_window(&mut self.buffer, &ex.args), "z"),
            Verb::Copy | Verb::Move => {
                if ex.args.is_empty() {
                    return Err(Error::Parse("missing destination".into()));
                }
                let dest = Address::new(ex.args.as_str()).with_find_flags(flags);
                if ex.verb == Verb::Copy {
                    check(range.copy(&mut self.buffer, &dest), "copy")
                } else {
                    check(range.move_to(&mut self.buffer, &dest), "move")
                }
            }
            Verb::Shift { right, times } => {
                let (_, count) = register_and_count(&ex.args)?;
                if let Some(count) = count {
                    check(range.set_count(&self.buffer, count), "count")?;
                }
                let width = self.options.shift_width;
                check(range.shift(&mut self.buffer, right, width, times), "shift")
            }
            Verb::LineNumber => {
                let end = if ex.range.is_empty() { Address::new("$") } else { at };
                let line = end.resolve(&self.buffer)?;
                registers.set('=', line.to_string(), false);
                Ok(())
            }
            Verb::Set => {
                let mut options: Options = self.options.clone();
                for option in ex.args.split([',', ' ']).filter(|o| !o.is_empty()) {
                    options.set(option)?;
                }
                self.options = options;
                Ok(())
            }
        }
    }

    fn file_argument(&self, name: &str) -> Result<PathBuf> {
        match name.trim() {
            "" => self
                .buffer
                .path()
                .ok_or_else(|| Error::Parse("missing file name".into())),
            name => Ok(PathBuf::from(name)),
        }
    }
}

fn single_char(args: &str) -> Result<char> {
    let mut chars = args.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Parse(format!("expected one character: {args}"))),
    }
}
