use crate::buffer::TextBuffer;
use crate::cursor::{column_at_display, first_non_blank, Cursor};
use crate::options::Options;
use crate::register::{FindChar, Registers};
use tracing::trace;

/// How an operator treats the span up to a motion's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    /// The target character is not part of the span.
    Exclusive,
    /// The target character is part of the span.
    Inclusive,
    /// Whole lines from the origin line to the target line.
    Linewise,
}

/// Everything a motion may look at while computing its target.
pub struct MotionCtx<'a> {
    pub buffer: &'a dyn TextBuffer,
    pub registers: &'a mut Registers,
    pub options: &'a Options,
    pub from: Cursor,
    pub count: Option<usize>,
    /// Column `j` and `k` try to keep.
    pub want: usize,
    /// Set when the motion follows an operator.
    pub operator: bool,
}

impl MotionCtx<'_> {
    fn n(&self) -> usize {
        self.count.unwrap_or(1).max(1)
    }
}

/// Target of a motion plus the characters it read after its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    pub to: Cursor,
    pub extra: usize,
}

impl Moved {
    fn to(to: Cursor) -> Option<Self> {
        Some(Self { to, extra: 0 })
    }
}

pub type MotionFn = fn(&mut MotionCtx<'_>, &str) -> Option<Moved>;

pub struct MotionCommand {
    pub keys: &'static str,
    pub kind: MotionKind,
    pub run: MotionFn,
}

/// A resolved motion: target, span kind and characters consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub keys: &'static str,
    pub to: Cursor,
    pub kind: MotionKind,
    pub consumed: usize,
}

fn cmd(keys: &'static str, kind: MotionKind, run: MotionFn) -> MotionCommand {
    MotionCommand { keys, kind, run }
}

/// The motion table, longest keys before their prefixes.
pub fn table() -> Vec<MotionCommand> {
    use MotionKind::*;
    vec![
        cmd("gg", Linewise, goto_first),
        cmd("G", Linewise, goto_last),
        cmd("h", Exclusive, left),
        cmd("\x08", Exclusive, left),
        cmd("\x7f", Exclusive, left),
        cmd("l", Exclusive, right),
        cmd(" ", Exclusive, right),
        cmd("j", Linewise, down),
        cmd("\x0e", Linewise, down),
        cmd("k", Linewise, up),
        cmd("\x10", Linewise, up),
        cmd("+", Linewise, down_first),
        cmd("\r", Linewise, down_first),
        cmd("\n", Linewise, down_first),
        cmd("-", Linewise, up_first),
        cmd("_", Linewise, current_first),
        cmd("0", Exclusive, line_start),
        cmd("^", Exclusive, line_first),
        cmd("$", Inclusive, line_end),
        cmd("|", Exclusive, column),
        cmd("w", Exclusive, |ctx, _| word_forward(ctx, false)),
        cmd("W", Exclusive, |ctx, _| word_forward(ctx, true)),
        cmd("b", Exclusive, |ctx, _| word_backward(ctx, false)),
        cmd("B", Exclusive, |ctx, _| word_backward(ctx, true)),
        cmd("e", Inclusive, |ctx, _| word_end(ctx, false)),
        cmd("E", Inclusive, |ctx, _| word_end(ctx, true)),
        cmd("f", Inclusive, |ctx, rest| find_char(ctx, 'f', rest)),
        cmd("t", Inclusive, |ctx, rest| find_char(ctx, 't', rest)),
        cmd("F", Exclusive, |ctx, rest| find_char(ctx, 'F', rest)),
        cmd("T", Exclusive, |ctx, rest| find_char(ctx, 'T', rest)),
        cmd(";", Inclusive, |ctx, _| repeat_find(ctx, false)),
        cmd(",", Exclusive, |ctx, _| repeat_find(ctx, true)),
        cmd("n", Exclusive, |ctx, _| search_next(ctx, false)),
        cmd("N", Exclusive, |ctx, _| search_next(ctx, true)),
        cmd("/", Exclusive, |ctx, rest| search(ctx, true, rest)),
        cmd("?", Exclusive, |ctx, rest| search(ctx, false, rest)),
        cmd("%", Inclusive, match_pair),
        cmd("}", Exclusive, paragraph_forward),
        cmd("{", Exclusive, paragraph_backward),
        cmd("'", Linewise, marker_line),
        cmd("`", Exclusive, marker_position),
    ]
}

pub fn lookup<'t>(table: &'t [MotionCommand], text: &str) -> Option<&'t MotionCommand> {
    table.iter().find(|m| text.starts_with(m.keys))
}

/// Matches `text` against the table and runs the motion. `None` covers both
/// "no such motion" and "motion failed".
pub fn resolve(table: &[MotionCommand], ctx: &mut MotionCtx<'_>, text: &str) -> Option<Target> {
    let motion = lookup(table, text)?;
    let rest = &text[motion.keys.len()..];
    let moved = (motion.run)(ctx, rest)?;
    let mut kind = motion.kind;
    // `;` and `,` take their kind from the repeated command
    if motion.keys == ";" || motion.keys == "," {
        kind = find_kind(ctx.registers.last_find().map(|f| {
            if motion.keys == "," { f.reversed().command } else { f.command }
        }));
    }
    // `%` with a count jumps to a percentage of the file
    if motion.keys == "%" && ctx.count.is_some() {
        kind = MotionKind::Linewise;
    }
    trace!(keys = motion.keys, to = ?moved.to, "motion");
    Some(Target {
        keys: motion.keys,
        to: moved.to,
        kind,
        consumed: motion.keys.len() + moved.extra,
    })
}

fn find_kind(command: Option<char>) -> MotionKind {
    match command {
        Some('F') | Some('T') => MotionKind::Exclusive,
        _ => MotionKind::Inclusive,
    }
}

fn goto_first(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let line = ctx.count.unwrap_or(1).max(1) - 1;
    let line = line.min(ctx.buffer.line_count() - 1);
    Moved::to(Cursor::new(line, first_non_blank(ctx.buffer, line)))
}

fn goto_last(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let last = ctx.buffer.line_count() - 1;
    let line = ctx.count.map_or(last, |n| n.max(1) - 1).min(last);
    Moved::to(Cursor::new(line, first_non_blank(ctx.buffer, line)))
}

fn left(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let mut to = ctx.from;
    to.move_left(ctx.n()).then_some(())?;
    Moved::to(to)
}

fn right(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let len = ctx.buffer.line_len(ctx.from.line);
    if ctx.operator {
        if len == 0 {
            return None;
        }
        return Moved::to(Cursor::new(ctx.from.line, (ctx.from.column + ctx.n()).min(len)));
    }
    let mut to = ctx.from;
    to.move_right(ctx.buffer, ctx.n()).then_some(())?;
    Moved::to(to)
}

fn down(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let mut to = ctx.from;
    to.move_down(ctx.buffer, ctx.n(), ctx.want).then_some(())?;
    Moved::to(to)
}

fn up(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let mut to = ctx.from;
    to.move_up(ctx.buffer, ctx.n(), ctx.want).then_some(())?;
    Moved::to(to)
}

fn down_first(ctx: &mut MotionCtx<'_>, rest: &str) -> Option<Moved> {
    let mut moved = down(ctx, rest)?;
    moved.to.move_to_first_non_blank(ctx.buffer);
    Some(moved)
}

fn up_first(ctx: &mut MotionCtx<'_>, rest: &str) -> Option<Moved> {
    let mut moved = up(ctx, rest)?;
    moved.to.move_to_first_non_blank(ctx.buffer);
    Some(moved)
}

fn current_first(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let line = (ctx.from.line + ctx.n() - 1).min(ctx.buffer.line_count() - 1);
    Moved::to(Cursor::new(line, first_non_blank(ctx.buffer, line)))
}

fn line_start(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    Moved::to(Cursor::new(ctx.from.line, 0))
}

fn line_first(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    Moved::to(Cursor::new(ctx.from.line, first_non_blank(ctx.buffer, ctx.from.line)))
}

fn line_end(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let line = (ctx.from.line + ctx.n() - 1).min(ctx.buffer.line_count() - 1);
    let len = ctx.buffer.line_len(line);
    ctx.want = usize::MAX;
    Moved::to(Cursor::new(line, len.saturating_sub(1)))
}

/// `N|` goes to screen column N, so tabs and wide characters count by width.
fn column(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let line = ctx.from.line;
    let len = ctx.buffer.line_len(line);
    let column = column_at_display(ctx.buffer, line, ctx.n() - 1, ctx.options.tab_stop);
    Moved::to(Cursor::new(line, column.min(len.saturating_sub(1))))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Blank,
    Word,
    Punct,
}

fn class_of(c: char, big: bool) -> CharClass {
    if c.is_whitespace() {
        CharClass::Blank
    } else if big || c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

/// Character-level walk over the buffer; line ends read as blanks.
struct Walker<'a> {
    buffer: &'a dyn TextBuffer,
    lines: Vec<Option<Vec<char>>>,
    big: bool,
}

impl<'a> Walker<'a> {
    fn new(buffer: &'a dyn TextBuffer, big: bool) -> Self {
        Self {
            buffer,
            lines: vec![None; buffer.line_count()],
            big,
        }
    }

    fn chars(&mut self, line: usize) -> &[char] {
        let buffer = self.buffer;
        self.lines[line].get_or_insert_with(|| buffer.line(line).unwrap_or_default().chars().collect())
    }

    fn len(&mut self, line: usize) -> usize {
        self.chars(line).len()
    }

    fn class(&mut self, at: Cursor) -> CharClass {
        let big = self.big;
        match self.chars(at.line).get(at.column) {
            Some(&c) => class_of(c, big),
            None => CharClass::Blank,
        }
    }

    /// Next position, stepping onto the line end before the next line.
    fn next(&mut self, at: Cursor) -> Option<Cursor> {
        if at.column < self.len(at.line) {
            Some(Cursor::new(at.line, at.column + 1))
        } else if at.line + 1 < self.lines.len() {
            Some(Cursor::new(at.line + 1, 0))
        } else {
            None
        }
    }

    fn prev(&mut self, at: Cursor) -> Option<Cursor> {
        if at.column > 0 {
            Some(Cursor::new(at.line, at.column - 1))
        } else if at.line > 0 {
            let len = self.len(at.line - 1);
            Some(Cursor::new(at.line - 1, len))
        } else {
            None
        }
    }

    fn is_empty_line(&mut self, line: usize) -> bool {
        self.len(line) == 0
    }
}

fn word_forward(ctx: &mut MotionCtx<'_>, big: bool) -> Option<Moved> {
    let mut walker = Walker::new(ctx.buffer, big);
    let mut pos = ctx.from;
    for _ in 0..ctx.n() {
        let start = walker.class(pos);
        let mut moved = false;
        if start != CharClass::Blank {
            while pos.column < walker.len(pos.line) && walker.class(pos) == start {
                pos.column += 1;
                moved = true;
            }
        }
        loop {
            if pos.column >= walker.len(pos.line) {
                match walker.next(pos) {
                    Some(next) if next.line != pos.line => {
                        pos = next;
                        moved = true;
                        if walker.is_empty_line(pos.line) {
                            break;
                        }
                    }
                    _ => {
                        // end of buffer: stop past the last character
                        if !moved && !ctx.operator {
                            return None;
                        }
                        return Moved::to(pos);
                    }
                }
            } else if walker.class(pos) == CharClass::Blank {
                pos.column += 1;
                moved = true;
            } else {
                break;
            }
        }
    }
    Moved::to(pos)
}

fn word_backward(ctx: &mut MotionCtx<'_>, big: bool) -> Option<Moved> {
    let mut walker = Walker::new(ctx.buffer, big);
    let mut pos = ctx.from;
    for _ in 0..ctx.n() {
        pos = walker.prev(pos)?;
        while walker.class(pos) == CharClass::Blank && !(pos.column == 0 && walker.is_empty_line(pos.line)) {
            pos = walker.prev(pos)?;
        }
        let class = walker.class(pos);
        while pos.column > 0 {
            let before = Cursor::new(pos.line, pos.column - 1);
            if walker.class(before) != class || class == CharClass::Blank {
                break;
            }
            pos = before;
        }
    }
    Moved::to(pos)
}

fn word_end(ctx: &mut MotionCtx<'_>, big: bool) -> Option<Moved> {
    let mut walker = Walker::new(ctx.buffer, big);
    let mut pos = ctx.from;
    for _ in 0..ctx.n() {
        pos = walker.next(pos)?;
        while walker.class(pos) == CharClass::Blank {
            pos = walker.next(pos)?;
        }
        let class = walker.class(pos);
        while pos.column + 1 < walker.len(pos.line)
            && walker.class(Cursor::new(pos.line, pos.column + 1)) == class
        {
            pos.column += 1;
        }
    }
    Moved::to(pos)
}

fn find_in_line(ctx: &MotionCtx<'_>, find: FindChar, count: usize, repeat: bool) -> Option<Cursor> {
    let text: Vec<char> = ctx.buffer.line(ctx.from.line)?.chars().collect();
    let col = ctx.from.column;
    let forward = matches!(find.command, 'f' | 't');
    let till = matches!(find.command, 't' | 'T');
    // a repeated `t` must not stick right before its own target
    let skip = usize::from(till && repeat);
    let hits: Vec<usize> = if forward {
        ((col + 1 + skip).min(text.len())..text.len())
            .filter(|&i| text[i] == find.target)
            .collect()
    } else {
        (0..col.saturating_sub(skip))
            .rev()
            .filter(|&i| text[i] == find.target)
            .collect()
    };
    let hit = *hits.get(count - 1)?;
    let column = match (forward, till) {
        (true, true) => hit - 1,
        (false, true) => hit + 1,
        _ => hit,
    };
    Some(Cursor::new(ctx.from.line, column))
}

fn find_char(ctx: &mut MotionCtx<'_>, command: char, rest: &str) -> Option<Moved> {
    let target = rest.chars().next()?;
    let find = FindChar { command, target };
    let to = find_in_line(ctx, find, ctx.n(), false)?;
    ctx.registers.set_last_find(find);
    Some(Moved {
        to,
        extra: target.len_utf8(),
    })
}

fn repeat_find(ctx: &mut MotionCtx<'_>, reverse: bool) -> Option<Moved> {
    let last = ctx.registers.last_find()?;
    let find = if reverse { last.reversed() } else { last };
    Moved::to(find_in_line(ctx, find, ctx.n(), true)?)
}

fn search_from(ctx: &MotionCtx<'_>, pattern: &str, forward: bool) -> Option<Cursor> {
    let flags = ctx.options.find_flags(forward);
    let mut pos = ctx.from;
    for _ in 0..ctx.n() {
        let start = if forward {
            Cursor::new(pos.line, pos.column + 1)
        } else {
            pos
        };
        pos = ctx.buffer.find(pattern, start, flags)?;
    }
    Some(pos)
}

fn search_next(ctx: &mut MotionCtx<'_>, reverse: bool) -> Option<Moved> {
    let pattern = ctx.registers.search()?.to_string();
    let forward = ctx.registers.search_forward() != reverse;
    Moved::to(search_from(ctx, &pattern, forward)?)
}

/// `/pattern` and `?pattern`; the pattern runs to the end of the text or
/// a carriage return. An empty pattern repeats the last one.
fn search(ctx: &mut MotionCtx<'_>, forward: bool, rest: &str) -> Option<Moved> {
    let end = rest.find(['\r', '\n']).map_or(rest.len(), |i| i + 1);
    let pattern = rest[..end].trim_end_matches(['\r', '\n']);
    let pattern = if pattern.is_empty() {
        ctx.registers.search()?.to_string()
    } else {
        pattern.to_string()
    };
    let to = search_from(ctx, &pattern, forward)?;
    ctx.registers.set_search(&pattern);
    ctx.registers.set_search_forward(forward);
    Some(Moved { to, extra: end })
}

fn match_pair(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let lines = ctx.buffer.line_count();
    if let Some(percent) = ctx.count {
        if percent > 100 {
            return None;
        }
        let line = ((percent * lines + 99) / 100).clamp(1, lines) - 1;
        return Moved::to(Cursor::new(line, first_non_blank(ctx.buffer, line)));
    }

    let mut walker = Walker::new(ctx.buffer, false);
    let from = ctx.from;
    let (col, this) = walker
        .chars(from.line)
        .iter()
        .enumerate()
        .skip(from.column)
        .find(|(_, c)| "()[]{}".contains(**c))
        .map(|(i, &c)| (i, c))?;
    let (other, forward) = match this {
        '(' => (')', true),
        '[' => (']', true),
        '{' => ('}', true),
        ')' => ('(', false),
        ']' => ('[', false),
        _ => ('{', false),
    };

    let mut pos = Cursor::new(from.line, col);
    let mut depth = 0usize;
    loop {
        if let Some(&c) = walker.chars(pos.line).get(pos.column) {
            if c == this {
                depth += 1;
            } else if c == other {
                depth -= 1;
                if depth == 0 {
                    return Moved::to(pos);
                }
            }
        }
        pos = if forward { walker.next(pos)? } else { walker.prev(pos)? };
    }
}

fn paragraph_forward(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let buffer = ctx.buffer;
    let last = buffer.line_count() - 1;
    let blank = |line: usize| buffer.line_len(line) == 0;
    let end = Cursor::new(last, buffer.line_len(last));
    if ctx.from.line == last {
        return None;
    }
    let mut line = ctx.from.line;
    for _ in 0..ctx.n() {
        while line < last && blank(line) {
            line += 1;
        }
        while line < last && !blank(line) {
            line += 1;
        }
    }
    if line == last && !blank(last) {
        let column = if ctx.operator { end.column } else { end.column.saturating_sub(1) };
        return Moved::to(Cursor::new(last, column));
    }
    Moved::to(Cursor::new(line, 0))
}

fn paragraph_backward(ctx: &mut MotionCtx<'_>, _: &str) -> Option<Moved> {
    let buffer = ctx.buffer;
    let blank = |line: usize| buffer.line_len(line) == 0;
    if ctx.from == Cursor::at_origin() {
        return None;
    }
    let mut line = ctx.from.line;
    for _ in 0..ctx.n() {
        while line > 0 && blank(line) {
            line -= 1;
        }
        while line > 0 && !blank(line) {
            line -= 1;
        }
    }
    Moved::to(Cursor::new(line, 0))
}

fn marker_line(ctx: &mut MotionCtx<'_>, rest: &str) -> Option<Moved> {
    let name = rest.chars().next()?;
    let at = ctx.buffer.marker(name)?;
    Some(Moved {
        to: Cursor::new(at.line, first_non_blank(ctx.buffer, at.line)),
        extra: name.len_utf8(),
    })
}

fn marker_position(ctx: &mut MotionCtx<'_>, rest: &str) -> Option<Moved> {
    let name = rest.chars().next()?;
    let mut to = ctx.buffer.marker(name)?;
    to.ensure_valid(ctx.buffer);
    Some(Moved {
        to,
        extra: name.len_utf8(),
    })
}
