//! The vi command dispatcher.
//!
//! [`Vi::command`] takes one command as the host accumulated it (`dw`,
//! `3ix<Esc>`, `:1,3d`) and returns false when the text is incomplete,
//! unknown or failed. Between calls the only pending state is an open
//! insert and the visual selection.

use crate::buffer::TextBuffer;
use crate::calc;
use crate::command::{combine_counts, parse_count, parse_prefix, Command, CommandKind, Target as CommandTarget};
use crate::cursor::{cell_width, column_at_display, first_non_blank, Cursor};
use crate::macros::MacroContext;
use crate::mode::{Mode, ModeHooks, ModeMachine, ESCAPE};
use crate::motion::{self, MotionCommand, MotionCtx, MotionKind, Target};
use crate::options::Options;
use crate::range::AddressRange;
use crate::register::Registers;
use crate::session::{Host, Session};
use tracing::{debug, trace};

/// Single keys that stand for a longer command in COMMAND mode.
const ALIASES: [(char, &str); 6] = [
    ('x', "dl"),
    ('X', "dh"),
    ('D', "d$"),
    ('Y', "yy"),
    ('s', "cl"),
    ('S', "cc"),
];

/// Motions that remember where they left in the `'` marker.
const JUMPS: [&str; 9] = ["G", "gg", "/", "?", "n", "N", "%", "'", "`"];

const VERTICAL: [&str; 4] = ["j", "k", "\x0e", "\x10"];

type OtherFn<B> = fn(&mut Vi<B>, &mut Registers, &Step<'_>) -> Option<usize>;

struct OtherCommand<B: TextBuffer> {
    keys: &'static str,
    /// Buffer-changing commands are remembered for `.`.
    changes: bool,
    run: OtherFn<B>,
}

fn other<B: TextBuffer>(keys: &'static str, changes: bool, run: OtherFn<B>) -> OtherCommand<B> {
    OtherCommand { keys, changes, run }
}

/// Arguments of a matched command: the prefix it was typed with and the
/// text after its keys.
#[derive(Debug, Clone, Copy)]
struct Step<'a> {
    count: Option<usize>,
    register: Option<char>,
    rest: &'a str,
}

impl Step<'_> {
    fn n(&self) -> usize {
        self.count.unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, Default)]
struct Pending {
    count: Option<usize>,
    register: Option<char>,
    /// Count and register selector as typed.
    prefix: String,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    first: usize,
    last: usize,
    /// Screen column the typed text goes in at.
    column: usize,
    /// Pad short lines with spaces (`A`) instead of skipping them.
    pad: bool,
}

#[derive(Debug, Clone, Default)]
struct InsertState {
    /// Command that opened the insert; empty when `.` cannot repeat it.
    trigger: String,
    text: String,
    count: usize,
    opened: bool,
    overwrite: bool,
    replaced: Vec<Option<char>>,
    block: Option<Block>,
}

/// Dispatcher state put back when a command fails.
struct Saved {
    registers: Registers,
    mode: ModeMachine,
    options: Options,
    caret: Cursor,
    anchor: Cursor,
    want: usize,
    pending: Pending,
    insert: InsertState,
    last_substitute: Option<String>,
}

pub struct Vi<B: TextBuffer> {
    pub(crate) buffer: B,
    mode: ModeMachine,
    motions: Vec<MotionCommand>,
    others: Vec<OtherCommand<B>>,
    pub(crate) options: Options,
    command: Command,
    anchor: Cursor,
    want: usize,
    pending: Pending,
    insert: InsertState,
    pub(crate) last_substitute: Option<String>,
    host: Option<Box<dyn Host>>,
}

impl<B: TextBuffer> Vi<B> {
    pub fn new(buffer: B) -> Self {
        Self::with_options(buffer, Options::default())
    }

    pub fn with_options(buffer: B, options: Options) -> Self {
        Self {
            buffer,
            mode: ModeMachine::new(),
            motions: motion::table(),
            others: Self::others(),
            options,
            command: Command::default(),
            anchor: Cursor::at_origin(),
            want: 0,
            pending: Pending::default(),
            insert: InsertState::default(),
            last_substitute: None,
            host: None,
        }
    }

    fn others() -> Vec<OtherCommand<B>> {
        vec![
            other("dd", true, |vi, regs, step| vi.line_operator(regs, 'd', step).map(|_| 0)),
            other("yy", false, |vi, regs, step| vi.line_operator(regs, 'y', step).map(|_| 0)),
            other("<<", true, |vi, regs, step| vi.line_operator(regs, '<', step).map(|_| 0)),
            other(">>", true, |vi, regs, step| vi.line_operator(regs, '>', step).map(|_| 0)),
            other("d", true, |vi, regs, step| vi.operator(regs, 'd', step)),
            other("y", false, |vi, regs, step| vi.operator(regs, 'y', step)),
            other("<", true, |vi, regs, step| vi.operator(regs, '<', step)),
            other(">", true, |vi, regs, step| vi.operator(regs, '>', step)),
            other("p", true, |vi, regs, step| vi.put(regs, step, true)),
            other("P", true, |vi, regs, step| vi.put(regs, step, false)),
            other("J", true, |vi, _, step| vi.join(step)),
            other("~", true, |vi, _, step| vi.toggle_case(step)),
            other("r", true, |vi, _, step| vi.replace_char(step)),
            other("u", false, |vi, _, step| vi.undo(step, true)),
            other("\x12", false, |vi, _, step| vi.undo(step, false)),
            other(".", false, |vi, regs, step| vi.repeat(regs, step)),
            other("m", false, |vi, _, step| vi.mark(step)),
            other("&", true, |vi, regs, _| vi.repeat_substitute(regs)),
        ]
    }

    pub fn set_host(&mut self, host: Box<dyn Host>) {
        self.host = Some(host);
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    pub fn mode(&self) -> &ModeMachine {
        &self.mode
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn caret(&self) -> Cursor {
        self.buffer.caret()
    }

    /// Anchor and caret of the visual selection.
    pub fn selection(&self) -> Option<(Cursor, Cursor)> {
        self.mode.is_visual().then(|| (self.anchor, self.buffer.caret()))
    }

    pub fn target(&self) -> CommandTarget {
        self.command.target()
    }

    /// Points the following `/` or `?` at the margin. The target snaps back
    /// after the search.
    pub fn set_target(&mut self, target: CommandTarget) {
        self.command.set_target(target);
    }

    /// Runs one command, routing `q` and `@` through the session's macro
    /// engine and recording successful commands while a macro is recorded.
    pub fn command(&mut self, session: &mut Session, text: &str) -> bool {
        if !self.mode.is_insert() {
            if let Some(prefix) = parse_prefix(text).filter(|p| p.body.starts_with(['q', '@'])) {
                let Session { registers, macros } = session;
                let mut replay = Replay { vi: self, registers };
                if macros.transition(prefix.body, Some(&mut replay), false, prefix.count_or_one()) > 0 {
                    return true;
                }
            }
        }
        let done = self.run(&mut session.registers, text);
        if done && !session.macros.is_playback() {
            session.macros.record(text);
        }
        done
    }

    /// Executes `text` as one unit: when any part of it fails, the buffer,
    /// the registers and the dispatcher state are put back as they were.
    pub(crate) fn run(&mut self, registers: &mut Registers, text: &str) -> bool {
        let saved = self.save(registers);
        self.buffer.begin();
        if self.execute(registers, text) {
            self.buffer.commit();
            return true;
        }
        if !self.buffer.rollback() {
            debug!(text, "buffer cannot roll back");
        }
        self.restore(registers, saved);
        false
    }

    fn save(&self, registers: &Registers) -> Saved {
        Saved {
            registers: registers.clone(),
            mode: self.mode.clone(),
            options: self.options.clone(),
            caret: self.buffer.caret(),
            anchor: self.anchor,
            want: self.want,
            pending: self.pending.clone(),
            insert: self.insert.clone(),
            last_substitute: self.last_substitute.clone(),
        }
    }

    fn restore(&mut self, registers: &mut Registers, saved: Saved) {
        let (from, to) = (self.mode.get(), saved.mode.get());
        *registers = saved.registers;
        self.mode = saved.mode;
        self.options = saved.options;
        self.buffer.set_caret(saved.caret);
        self.anchor = saved.anchor;
        self.want = saved.want;
        self.pending = saved.pending;
        self.insert = saved.insert;
        self.last_substitute = saved.last_substitute;
        if from != to {
            if let Some(host) = self.host.as_mut() {
                host.mode_changed(from, to);
            }
        }
    }

    fn execute(&mut self, registers: &mut Registers, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        trace!(text, mode = self.mode.get().name(), "command");
        if self.mode.is_insert() && !text.starts_with(ESCAPE) {
            return self.type_text(registers, text);
        }
        self.command.set(text);
        let done = match self.command.kind() {
            CommandKind::Command => {
                if self.mode.is_visual() {
                    self.mark_selection(self.mode.get());
                    self.transition(registers, ESCAPE);
                }
                self.ex_command(registers, &text[1..])
            }
            CommandKind::Calc => self.calc(registers, &text[1..]),
            CommandKind::Exec => self.exec(&text[1..]),
            CommandKind::FindMargin => self.find_margin(registers, text),
            CommandKind::Find | CommandKind::Vi => self.vi_command(registers, text),
            CommandKind::None => false,
        };
        if !done {
            debug!(text, "command rejected");
        }
        done
    }

    fn vi_command(&mut self, registers: &mut Registers, text: &str) -> bool {
        let Some(prefix) = parse_prefix(text) else {
            return false;
        };
        if prefix.body.is_empty() {
            return false;
        }
        self.pending = Pending {
            count: prefix.count,
            register: prefix.register,
            prefix: text[..text.len() - prefix.body.len()].to_string(),
        };
        let body = if self.mode.get() == Mode::Command {
            alias(prefix.body)
        } else {
            prefix.body.to_string()
        };
        let grown = body.len() - prefix.body.len();

        if body.starts_with(ESCAPE) && self.mode.is_visual() {
            self.mark_selection(self.mode.get());
        }
        let (understood, consumed) = self.transition(registers, &body);
        if understood {
            let rest = &body[consumed.min(body.len())..];
            if rest.is_empty() {
                return true;
            }
            return if self.mode.is_insert() {
                self.type_text(registers, rest)
            } else {
                self.execute(registers, rest)
            };
        }
        if let Some(rest) = body.strip_prefix(ESCAPE) {
            return self.continue_with(registers, rest);
        }
        if self.mode.is_visual() {
            return self.visual_command(registers, &body, prefix.count, prefix.register);
        }

        let Some((used, changes)) = self.normal_command(registers, &body, prefix.count, prefix.register) else {
            return false;
        };
        let used = used - grown;
        if changes {
            registers.set_last_command(format!("{}{}", self.pending.prefix, &prefix.body[..used]));
        }
        self.continue_with(registers, &prefix.body[used..])
    }

    fn continue_with(&mut self, registers: &mut Registers, rest: &str) -> bool {
        rest.is_empty() || self.execute(registers, rest)
    }

    /// Runs a motion or an entry of the other table; returns the characters
    /// used and whether the command changed the buffer.
    fn normal_command(
        &mut self,
        registers: &mut Registers,
        body: &str,
        count: Option<usize>,
        register: Option<char>,
    ) -> Option<(usize, bool)> {
        if motion::lookup(&self.motions, body).is_some() {
            let from = self.buffer.caret();
            let target = self.run_motion(registers, body, count, false)?;
            self.jump_to(target, from);
            return Some((target.consumed, false));
        }
        let (keys, changes, run) = self
            .others
            .iter()
            .find(|c| body.starts_with(c.keys))
            .map(|c| (c.keys, c.changes, c.run))?;
        let step = Step {
            count,
            register,
            rest: &body[keys.len()..],
        };
        let used = run(self, registers, &step)?;
        Some((keys.len() + used, changes))
    }

    fn transition(&mut self, registers: &mut Registers, text: &str) -> (bool, usize) {
        let mut mode = std::mem::take(&mut self.mode);
        let understood = mode.transition(text, &mut Hooks { vi: self, registers });
        let consumed = mode.consumed();
        self.mode = mode;
        (understood, consumed)
    }

    fn run_motion(
        &mut self,
        registers: &mut Registers,
        text: &str,
        count: Option<usize>,
        operator: bool,
    ) -> Option<Target> {
        let mut ctx = MotionCtx {
            buffer: &self.buffer,
            registers,
            options: &self.options,
            from: self.buffer.caret(),
            count,
            want: self.want,
            operator,
        };
        motion::resolve(&self.motions, &mut ctx, text)
    }

    fn jump_to(&mut self, target: Target, from: Cursor) {
        if JUMPS.contains(&target.keys) {
            self.buffer.set_marker('\'', from);
        }
        let mut to = target.to;
        to.ensure_valid(&self.buffer);
        self.buffer.set_caret(to);
        if target.keys == "$" {
            self.want = usize::MAX;
        } else if !VERTICAL.contains(&target.keys) {
            self.want = to.column;
        }
    }

    // ==================== operators ====================

    fn operator(&mut self, registers: &mut Registers, op: char, step: &Step<'_>) -> Option<usize> {
        let (inner, rest) = parse_count(step.rest);
        let used = step.rest.len() - rest.len();
        let count = combine_counts(step.count, inner);
        if rest.is_empty() {
            return None;
        }
        if rest.starts_with(op) {
            let doubled = Step {
                count,
                register: step.register,
                rest: "",
            };
            self.line_operator(registers, op, &doubled)?;
            return Some(used + op.len_utf8());
        }
        let from = self.buffer.caret();
        let target = self.run_motion(registers, rest, count, true)?;
        if target.kind == MotionKind::Linewise {
            let (first, last) = ordered(from.line, target.to.line);
            self.apply_lines(registers, op, first, last, step.register)?;
        } else {
            let (start, end) = self.char_span(from, &target);
            match op {
                'd' => self.delete_span(registers, start, end, step.register)?,
                'y' => {
                    if start == end {
                        return None;
                    }
                    let text = self.buffer.text_range(start, end);
                    registers.yank(step.register, &text, false);
                    self.buffer.set_caret(start);
                }
                _ => self.apply_lines(registers, op, start.line, end.line, step.register)?,
            }
        }
        Some(used + target.consumed)
    }

    /// `dd`, `yy`, `<<`, `>>` over `count` lines from the caret.
    fn line_operator(&mut self, registers: &mut Registers, op: char, step: &Step<'_>) -> Option<()> {
        let first = self.buffer.caret().line;
        let last = (first + step.n() - 1).min(self.buffer.line_count() - 1);
        self.apply_lines(registers, op, first, last, step.register)
    }

    fn apply_lines(
        &mut self,
        registers: &mut Registers,
        op: char,
        first: usize,
        last: usize,
        register: Option<char>,
    ) -> Option<()> {
        let range = AddressRange::from_lines(first + 1, last + 1);
        let done = match op {
            'd' => range.erase(&mut self.buffer, registers, register),
            'y' => {
                let caret = self.buffer.caret();
                if caret.line != first {
                    self.buffer.set_caret(Cursor::new(first, caret.column));
                }
                range.yank(&self.buffer, registers, register)
            }
            '<' | '>' => range.shift(&mut self.buffer, op == '>', self.options.shift_width, 1),
            _ => false,
        };
        if done {
            self.want = self.buffer.caret().column;
        }
        done.then_some(())
    }

    /// Span covered by a characterwise motion from `from`, as a half-open
    /// range.
    fn char_span(&self, from: Cursor, target: &Target) -> (Cursor, Cursor) {
        let (start, mut end) = ordered(from, target.to);
        if target.kind == MotionKind::Inclusive {
            end.column = (end.column + 1).min(self.buffer.line_len(end.line));
        } else if matches!(target.keys, "w" | "W") && end.line > start.line {
            // a word motion never takes the line break with it
            end = Cursor::new(start.line, self.buffer.line_len(start.line));
        } else if end.column == 0 && end.line > start.line {
            end = Cursor::new(end.line - 1, self.buffer.line_len(end.line - 1));
        }
        (start, end)
    }

    fn delete_span(
        &mut self,
        registers: &mut Registers,
        start: Cursor,
        end: Cursor,
        register: Option<char>,
    ) -> Option<()> {
        if start == end || self.buffer.is_read_only() {
            return None;
        }
        self.buffer.checkpoint();
        let removed = self.buffer.delete(start, end)?;
        registers.delete(register, &removed, false);
        let mut caret = start;
        caret.ensure_valid(&self.buffer);
        self.buffer.set_caret(caret);
        self.want = caret.column;
        Some(())
    }

    // ==================== other commands ====================

    fn put(&mut self, registers: &mut Registers, step: &Step<'_>, after: bool) -> Option<usize> {
        let name = step.register.unwrap_or('"');
        let register = registers.get(name)?.clone();
        if self.buffer.is_read_only() {
            return None;
        }
        let caret = self.buffer.caret();
        self.buffer.checkpoint();
        if register.linewise {
            let lines = register.lines();
            let all: Vec<String> = (0..step.n()).flat_map(|_| lines.iter().cloned()).collect();
            let at = if after { caret.line + 1 } else { caret.line };
            self.buffer.insert_lines(at, &all).then_some(())?;
            self.buffer
                .set_caret(Cursor::new(at, first_non_blank(&self.buffer, at)));
        } else {
            let text = register.content.repeat(step.n());
            let column = if after && self.buffer.line_len(caret.line) > 0 {
                caret.column + 1
            } else {
                caret.column
            };
            let at = Cursor::new(caret.line, column);
            self.buffer.insert(at, &text).then_some(())?;
            let mut end = end_of(at, &text);
            end.column = end.column.saturating_sub(1);
            self.buffer.set_caret(end);
        }
        Some(0)
    }

    fn join(&mut self, step: &Step<'_>) -> Option<usize> {
        let first = self.buffer.caret().line;
        self.join_lines(first, first + step.n().max(2) - 1)?;
        Some(0)
    }

    fn join_lines(&mut self, first: usize, last: usize) -> Option<()> {
        if last >= self.buffer.line_count() {
            return None;
        }
        AddressRange::from_lines(first + 1, last + 1)
            .join(&mut self.buffer)
            .then_some(())
    }

    fn toggle_case(&mut self, step: &Step<'_>) -> Option<usize> {
        let caret = self.buffer.caret();
        let text = self.buffer.line(caret.line)?;
        let len = text.chars().count();
        if len == 0 || self.buffer.is_read_only() {
            return None;
        }
        let end = (caret.column + step.n()).min(len);
        let flipped: String = text
            .chars()
            .enumerate()
            .map(|(i, c)| if (caret.column..end).contains(&i) { flip_case(c) } else { c })
            .collect();
        self.buffer.checkpoint();
        self.buffer.set_line(caret.line, &flipped);
        self.buffer.set_caret(Cursor::new(caret.line, end.min(len - 1)));
        Some(0)
    }

    fn replace_char(&mut self, step: &Step<'_>) -> Option<usize> {
        let c = step.rest.chars().next()?;
        let caret = self.buffer.caret();
        let n = step.n();
        if c == '\x1b' || caret.column + n > self.buffer.line_len(caret.line) || self.buffer.is_read_only() {
            return None;
        }
        self.buffer.checkpoint();
        let end = Cursor::new(caret.line, caret.column + n);
        self.buffer.replace(caret, end, &c.to_string().repeat(n));
        self.buffer.set_caret(Cursor::new(caret.line, caret.column + n - 1));
        Some(c.len_utf8())
    }

    fn undo(&mut self, step: &Step<'_>, undo: bool) -> Option<usize> {
        let mut done = 0;
        for _ in 0..step.n() {
            let ok = if undo { self.buffer.undo() } else { self.buffer.redo() };
            if !ok {
                break;
            }
            done += 1;
        }
        let mut caret = self.buffer.caret();
        caret.ensure_valid(&self.buffer);
        self.buffer.set_caret(caret);
        (done > 0).then_some(0)
    }

    /// `.`: runs the last change again, with a new count replacing the
    /// original one.
    fn repeat(&mut self, registers: &mut Registers, step: &Step<'_>) -> Option<usize> {
        let last = registers.last_command()?.to_string();
        let command = match step.count {
            Some(n) => format!("{n}{}", parse_count(&last).1),
            None => last,
        };
        trace!(command, "repeat");
        self.execute(registers, &command).then_some(0)
    }

    fn mark(&mut self, step: &Step<'_>) -> Option<usize> {
        let name = step.rest.chars().next()?;
        if !(name.is_ascii_alphabetic() || "'`<>".contains(name)) {
            return None;
        }
        let name = if name == '`' { '\'' } else { name };
        let caret = self.buffer.caret();
        self.buffer.set_marker(name, caret).then_some(1)
    }

    fn repeat_substitute(&mut self, registers: &mut Registers) -> Option<usize> {
        let data = self.last_substitute.clone()?;
        AddressRange::parse("")
            .with_find_flags(self.options.find_flags(true))
            .substitute(&mut self.buffer, registers, &data)
            .then_some(0)
    }

    // ==================== prefixed commands ====================

    fn calc(&mut self, registers: &mut Registers, expr: &str) -> bool {
        match calc::evaluate(expr, &self.buffer) {
            Ok(value) => {
                trace!(value, "calc");
                registers.set('=', value.to_string(), false);
                true
            }
            Err(e) => {
                debug!(expr, error = %e, "calc failed");
                false
            }
        }
    }

    fn exec(&mut self, command: &str) -> bool {
        match self.host.as_mut() {
            Some(host) => host.exec(command),
            None => {
                debug!(command, "no host to run command");
                false
            }
        }
    }

    fn find_margin(&mut self, registers: &mut Registers, text: &str) -> bool {
        let forward = text.starts_with('/');
        let typed = text[1..].trim_end_matches(['\r', '\n']);
        let pattern = if typed.is_empty() {
            registers.search().map(String::from)
        } else {
            Some(typed.to_string())
        };
        self.command.restore();
        let Some(pattern) = pattern else {
            return false;
        };
        let caret = self.buffer.caret();
        let from = if forward { caret.line + 1 } else { caret.line };
        match self.buffer.find_margin(&pattern, from, self.options.find_flags(forward)) {
            Some(line) => {
                registers.set_search(&pattern);
                registers.set_search_forward(forward);
                self.buffer.set_marker('\'', caret);
                self.buffer
                    .set_caret(Cursor::new(line, first_non_blank(&self.buffer, line)));
                true
            }
            None => false,
        }
    }

    // ==================== insert ====================

    fn enter_insert(&mut self, registers: &mut Registers, command: &str, from: Mode) -> Option<usize> {
        let key = command.chars().next()?;
        let mut block = None;
        let consumed = match from {
            Mode::VisualBlock => {
                block = Some(self.open_block(registers, key)?);
                key.len_utf8()
            }
            Mode::Visual | Mode::VisualLine => {
                self.mark_selection(from);
                self.change_selection(registers, from)?;
                1
            }
            _ => self.open_insert(registers, command, key)?,
        };
        let counted = from == Mode::Command && "aiAIoO".contains(key);
        self.insert = InsertState {
            trigger: if from == Mode::Command {
                format!("{}{}", self.pending.prefix, &command[..consumed])
            } else {
                String::new()
            },
            count: if counted { self.pending.count.unwrap_or(1) } else { 1 },
            opened: counted && matches!(key, 'o' | 'O'),
            overwrite: key == 'R' && from == Mode::Command,
            block,
            ..InsertState::default()
        };
        Some(consumed)
    }

    fn open_insert(&mut self, registers: &mut Registers, command: &str, key: char) -> Option<usize> {
        let caret = self.buffer.caret();
        let len = self.buffer.line_len(caret.line);
        let count = self.pending.count;
        match key {
            'c' => {
                let rest = &command[1..];
                let (inner, motion) = parse_count(rest);
                let count = combine_counts(count, inner);
                let used = 1 + rest.len() - motion.len();
                if motion.is_empty() {
                    return None;
                }
                if motion.starts_with('c') {
                    let last = (caret.line + count.unwrap_or(1).max(1) - 1).min(self.buffer.line_count() - 1);
                    self.change_lines(registers, caret.line, last);
                    return Some(used + 1);
                }
                return self.change(registers, motion, count).map(|n| used + n);
            }
            'C' => return self.change(registers, "$", count).map(|_| 1),
            'o' | 'O' => {
                self.open_line(key == 'O');
                return Some(1);
            }
            'i' | 'a' | 'I' | 'A' | 'R' => self.buffer.checkpoint(),
            _ => return None,
        }
        let column = match key {
            'a' => (caret.column + 1).min(len),
            'I' => first_non_blank(&self.buffer, caret.line),
            'A' => len,
            _ => caret.column,
        };
        self.buffer.set_caret(Cursor::new(caret.line, column));
        Some(1)
    }

    fn change(&mut self, registers: &mut Registers, motion: &str, count: Option<usize>) -> Option<usize> {
        let from = self.buffer.caret();
        let on_word = self
            .buffer
            .line(from.line)
            .and_then(|l| l.chars().nth(from.column))
            .is_some_and(|c| !c.is_whitespace());
        // `cw` on a word changes to the end of the word, like `ce`
        let motion = match motion.chars().next() {
            Some('w') if on_word => format!("e{}", &motion[1..]),
            Some('W') if on_word => format!("E{}", &motion[1..]),
            _ => motion.to_string(),
        };
        let target = self.run_motion(registers, &motion, count, true)?;
        if target.kind == MotionKind::Linewise {
            let (first, last) = ordered(from.line, target.to.line);
            self.change_lines(registers, first, last);
            return Some(target.consumed);
        }
        let (start, end) = self.char_span(from, &target);
        self.buffer.checkpoint();
        if start != end {
            let removed = self.buffer.delete(start, end)?;
            registers.delete(self.pending.register, &removed, false);
        }
        self.buffer.set_caret(start);
        Some(target.consumed)
    }

    /// Replaces lines `first..=last` with one (indented) empty line.
    fn change_lines(&mut self, registers: &mut Registers, first: usize, last: usize) {
        let lines: Vec<String> = (first..=last).filter_map(|l| self.buffer.line(l)).collect();
        let indent = match lines.first() {
            Some(line) if self.options.auto_indent => leading_blanks(line),
            _ => String::new(),
        };
        self.buffer.checkpoint();
        registers.delete(self.pending.register, &format!("{}\n", lines.join("\n")), true);
        if last > first {
            self.buffer.delete_lines(first + 1, last);
        }
        self.buffer.set_line(first, &indent);
        self.buffer.set_caret(Cursor::new(first, indent.chars().count()));
    }

    fn change_selection(&mut self, registers: &mut Registers, mode: Mode) -> Option<()> {
        let (start, end) = ordered(self.anchor, self.buffer.caret());
        if mode == Mode::VisualLine {
            self.change_lines(registers, start.line, end.line);
            return Some(());
        }
        let (start, end) = self.visual_span(start, end);
        self.buffer.checkpoint();
        let removed = self.buffer.delete(start, end)?;
        registers.delete(self.pending.register, &removed, false);
        self.buffer.set_caret(start);
        Some(())
    }

    fn open_line(&mut self, above: bool) {
        let caret = self.buffer.caret();
        let indent = if self.options.auto_indent {
            leading_blanks(&self.buffer.line(caret.line).unwrap_or_default())
        } else {
            String::new()
        };
        self.buffer.checkpoint();
        let at = if above { caret.line } else { caret.line + 1 };
        self.buffer.insert_lines(at, &[indent.clone()]);
        self.buffer.set_caret(Cursor::new(at, indent.chars().count()));
    }

    fn open_block(&mut self, registers: &mut Registers, key: char) -> Option<Block> {
        let (first, last, left, right) = self.block_bounds();
        self.mark_selection(Mode::VisualBlock);
        self.buffer.checkpoint();
        let (column, pad) = match key {
            'a' | 'A' => (right, true),
            'c' | 'C' | 's' => {
                self.cut_block(registers, self.pending.register, true)?;
                (left, false)
            }
            _ => (left, false),
        };
        let width = self.line_width(first);
        if pad && width < column {
            let len = self.buffer.line_len(first);
            self.buffer.insert(Cursor::new(first, len), &" ".repeat(column - width));
        }
        let at = column_at_display(&self.buffer, first, column, self.options.tab_stop);
        self.buffer.set_caret(Cursor::new(first, at));
        Some(Block {
            first,
            last,
            column,
            pad,
        })
    }

    /// Literal input while an insert-family mode is active. An embedded
    /// escape ends the insert; text after it runs as commands.
    fn type_text(&mut self, registers: &mut Registers, text: &str) -> bool {
        let (literal, tail) = match text.find(ESCAPE) {
            Some(i) => text.split_at(i),
            None => (text, ""),
        };
        for c in literal.chars() {
            match c {
                '\x08' | '\x7f' => self.backspace(),
                '\r' => self.type_char('\n'),
                c => self.type_char(c),
            }
        }
        if tail.is_empty() {
            return true;
        }
        let (_, consumed) = self.transition(registers, tail);
        self.continue_with(registers, &tail[consumed.max(ESCAPE.len())..])
    }

    fn type_char(&mut self, c: char) {
        let caret = self.buffer.caret();
        if c == '\n' {
            let indent = if self.options.auto_indent {
                leading_blanks(&self.buffer.line(caret.line).unwrap_or_default())
            } else {
                String::new()
            };
            let text = format!("\n{indent}");
            if self.buffer.insert(caret, &text) {
                self.buffer.set_caret(Cursor::new(caret.line + 1, indent.chars().count()));
                self.insert.text.push_str(&text);
            }
            return;
        }
        let next = Cursor::new(caret.line, caret.column + 1);
        let typed = if self.insert.overwrite && caret.column < self.buffer.line_len(caret.line) {
            let old = self.buffer.text_range(caret, next).chars().next();
            self.insert.replaced.push(old);
            self.buffer.replace(caret, next, &c.to_string())
        } else {
            if self.insert.overwrite {
                self.insert.replaced.push(None);
            }
            self.buffer.insert(caret, &c.to_string())
        };
        if typed {
            self.buffer.set_caret(next);
            self.insert.text.push(c);
        }
    }

    /// Removes the previous typed character; never reaches before the point
    /// where the insert started.
    fn backspace(&mut self) {
        if self.insert.text.pop().is_none() {
            return;
        }
        let caret = self.buffer.caret();
        if caret.column == 0 {
            if caret.line == 0 {
                return;
            }
            let prev = Cursor::new(caret.line - 1, self.buffer.line_len(caret.line - 1));
            self.buffer.delete(prev, caret);
            self.buffer.set_caret(prev);
            return;
        }
        let at = Cursor::new(caret.line, caret.column - 1);
        match self.insert.replaced.pop() {
            Some(Some(old)) if self.insert.overwrite => {
                self.buffer.replace(at, caret, &old.to_string());
            }
            _ => {
                self.buffer.delete(at, caret);
            }
        }
        self.buffer.set_caret(at);
    }

    fn leave_insert(&mut self, registers: &mut Registers, mode: Mode) {
        let insert = std::mem::take(&mut self.insert);
        let mut caret = self.buffer.caret();
        if insert.count > 1 && !insert.text.is_empty() {
            let (at, text) = if insert.opened {
                let at = Cursor::new(caret.line, self.buffer.line_len(caret.line));
                (at, format!("\n{}", insert.text))
            } else {
                (caret, insert.text.clone())
            };
            let more = text.repeat(insert.count - 1);
            if self.buffer.insert(at, &more) {
                caret = end_of(at, &more);
            }
        }
        match (mode, insert.block) {
            (Mode::InsertBlock, Some(block)) => {
                if !insert.text.is_empty() && !insert.text.contains('\n') {
                    self.replicate(block, &insert.text);
                }
                let at = column_at_display(&self.buffer, block.first, block.column, self.options.tab_stop);
                caret = Cursor::new(block.first, at);
            }
            _ => caret.column = caret.column.saturating_sub(1),
        }
        caret.ensure_valid(&self.buffer);
        self.buffer.set_caret(caret);
        self.want = caret.column;
        if !insert.text.is_empty() {
            registers.set('.', insert.text.as_str(), false);
        }
        if !insert.trigger.is_empty() {
            registers.set_last_command(format!("{}{}{ESCAPE}", insert.trigger, insert.text));
        }
    }

    /// Copies text typed on the first line of a block onto the others.
    fn replicate(&mut self, block: Block, text: &str) {
        for line in block.first + 1..=block.last {
            let width = self.line_width(line);
            if width < block.column {
                if !block.pad {
                    continue;
                }
                let len = self.buffer.line_len(line);
                self.buffer
                    .insert(Cursor::new(line, len), &" ".repeat(block.column - width));
            }
            let at = column_at_display(&self.buffer, line, block.column, self.options.tab_stop);
            self.buffer.insert(Cursor::new(line, at), text);
        }
    }

    // ==================== visual ====================

    fn visual_command(
        &mut self,
        registers: &mut Registers,
        body: &str,
        count: Option<usize>,
        register: Option<char>,
    ) -> bool {
        let from = self.buffer.caret();
        if motion::lookup(&self.motions, body).is_some() {
            let Some(target) = self.run_motion(registers, body, count, false) else {
                return false;
            };
            self.jump_to(target, from);
            return self.continue_with(registers, &body[target.consumed..]);
        }

        let mode = self.mode.get();
        let mut chars = body.chars();
        let Some(key) = chars.next() else {
            return false;
        };
        let replacement = chars.next();
        let used = match (key, replacement) {
            ('o', _) => {
                self.buffer.set_caret(self.anchor);
                self.anchor = from;
                return self.continue_with(registers, &body[1..]);
            }
            ('r', Some(c)) if c != '\x1b' => 1 + c.len_utf8(),
            ('d' | 'x' | 'X' | 'D' | 'y' | 'Y' | '<' | '>' | 'J' | '~' | 'u' | 'U', _) => 1,
            _ => return false,
        };

        self.mark_selection(mode);
        let (start, end) = ordered(self.anchor, from);
        let linewise = mode == Mode::VisualLine || matches!(key, 'X' | 'D' | 'Y');
        let done = match key {
            'd' | 'x' | 'X' | 'D' if linewise => self.apply_lines(registers, 'd', start.line, end.line, register),
            'y' | 'Y' if linewise => self.apply_lines(registers, 'y', start.line, end.line, register),
            'd' | 'x' | 'y' if mode == Mode::VisualBlock => {
                if key != 'y' {
                    self.buffer.checkpoint();
                }
                self.cut_block(registers, register, key != 'y')
            }
            'd' | 'x' => {
                let (start, end) = self.visual_span(start, end);
                self.delete_span(registers, start, end, register)
            }
            'y' => {
                let (start, end) = self.visual_span(start, end);
                registers.yank(register, &self.buffer.text_range(start, end), false);
                self.buffer.set_caret(start);
                Some(())
            }
            '<' | '>' => self.apply_lines(registers, key, start.line, end.line, register),
            'J' => self.join_lines(start.line, end.line.max(start.line + 1)),
            '~' => self.map_selection(mode, flip_case),
            'u' => self.map_selection(mode, |c| c.to_lowercase().next().unwrap_or(c)),
            'U' => self.map_selection(mode, |c| c.to_uppercase().next().unwrap_or(c)),
            _ => {
                let c = replacement.unwrap_or(key);
                self.map_selection(mode, |_| c)
            }
        };
        if done.is_none() {
            return false;
        }
        self.transition(registers, ESCAPE);
        self.continue_with(registers, &body[used..])
    }

    /// Lines and half-open screen columns of the block selection.
    fn block_bounds(&self) -> (usize, usize, usize, usize) {
        let caret = self.buffer.caret();
        let (first, last) = ordered(self.anchor.line, caret.line);
        let tab_stop = self.options.tab_stop;
        let cells = |at: Cursor| {
            let start = at.display_column(&self.buffer, tab_stop);
            let width = self
                .buffer
                .line(at.line)
                .and_then(|text| text.chars().nth(at.column))
                .map_or(1, |c| cell_width(c, start, tab_stop).max(1));
            (start, start + width)
        };
        let (anchor, caret) = (cells(self.anchor), cells(caret));
        (first, last, anchor.0.min(caret.0), anchor.1.max(caret.1))
    }

    /// Character columns on `line` under screen columns `left..right`.
    fn block_span(&self, line: usize, left: usize, right: usize) -> (usize, usize) {
        let tab_stop = self.options.tab_stop;
        (
            column_at_display(&self.buffer, line, left, tab_stop),
            column_at_display(&self.buffer, line, right, tab_stop),
        )
    }

    fn line_width(&self, line: usize) -> usize {
        Cursor::new(line, self.buffer.line_len(line)).display_column(&self.buffer, self.options.tab_stop)
    }

    /// Half-open span of a characterwise selection.
    fn visual_span(&self, start: Cursor, mut end: Cursor) -> (Cursor, Cursor) {
        end.column = (end.column + 1).min(self.buffer.line_len(end.line));
        (start, end)
    }

    fn selected_columns(&self, mode: Mode, line: usize) -> (usize, usize) {
        let (start, end) = ordered(self.anchor, self.buffer.caret());
        let len = self.buffer.line_len(line);
        match mode {
            Mode::VisualLine => (0, len),
            Mode::VisualBlock => {
                let (_, _, left, right) = self.block_bounds();
                self.block_span(line, left, right)
            }
            _ => {
                let from = if line == start.line { start.column } else { 0 };
                let to = if line == end.line { end.column + 1 } else { len };
                (from.min(len), to.min(len))
            }
        }
    }

    fn map_selection(&mut self, mode: Mode, f: impl Fn(char) -> char) -> Option<()> {
        if self.buffer.is_read_only() {
            return None;
        }
        let (start, end) = ordered(self.anchor, self.buffer.caret());
        let spans: Vec<(usize, usize, usize)> = (start.line..=end.line)
            .map(|line| {
                let (from, to) = self.selected_columns(mode, line);
                (line, from, to)
            })
            .collect();
        self.buffer.checkpoint();
        for (line, from, to) in spans {
            let text = self.buffer.line(line).unwrap_or_default();
            let mapped: String = text
                .chars()
                .enumerate()
                .map(|(i, c)| if (from..to).contains(&i) { f(c) } else { c })
                .collect();
            if mapped != text {
                self.buffer.set_line(line, &mapped);
            }
        }
        let caret = match mode {
            Mode::VisualBlock => {
                let (first, _, left, right) = self.block_bounds();
                Cursor::new(first, self.block_span(first, left, right).0)
            }
            Mode::VisualLine => Cursor::new(start.line, first_non_blank(&self.buffer, start.line)),
            _ => start,
        };
        self.buffer.set_caret(caret);
        Some(())
    }

    /// Copies the block selection into a register, removing it when
    /// `delete` is set.
    fn cut_block(&mut self, registers: &mut Registers, register: Option<char>, delete: bool) -> Option<()> {
        let (first, last, left, right) = self.block_bounds();
        if delete && self.buffer.is_read_only() {
            return None;
        }
        let mut pieces = Vec::with_capacity(last - first + 1);
        for line in first..=last {
            let (from, to) = self.block_span(line, left, right);
            let start = Cursor::new(line, from);
            let end = Cursor::new(line, to);
            pieces.push(self.buffer.text_range(start, end));
            if delete && start != end {
                self.buffer.delete(start, end)?;
            }
        }
        let text = pieces.join("\n");
        if delete {
            registers.delete(register, &text, false);
        } else {
            registers.yank(register, &text, false);
        }
        let mut caret = Cursor::new(first, self.block_span(first, left, right).0);
        caret.ensure_valid(&self.buffer);
        self.buffer.set_caret(caret);
        Some(())
    }

    /// Stores the selection in the `<` and `>` markers.
    fn mark_selection(&mut self, mode: Mode) {
        let (mut start, mut end) = ordered(self.anchor, self.buffer.caret());
        match mode {
            Mode::VisualLine => {
                start.column = 0;
                end.column = self.buffer.line_len(end.line).saturating_sub(1);
            }
            Mode::VisualBlock => {
                let (first, last, left, right) = self.block_bounds();
                let tab_stop = self.options.tab_stop;
                start = Cursor::new(first, column_at_display(&self.buffer, first, left, tab_stop));
                end = Cursor::new(last, column_at_display(&self.buffer, last, right - 1, tab_stop));
            }
            _ => {}
        }
        self.buffer.set_marker('<', start);
        self.buffer.set_marker('>', end);
    }
}

/// Gives the mode machine access to the dispatcher while it runs.
struct Hooks<'a, B: TextBuffer> {
    vi: &'a mut Vi<B>,
    registers: &'a mut Registers,
}

impl<B: TextBuffer> ModeHooks for Hooks<'_, B> {
    fn read_only(&self) -> bool {
        self.vi.buffer.is_read_only()
    }

    fn enter_insert(&mut self, command: &str, from: Mode) -> Option<usize> {
        self.vi.enter_insert(self.registers, command, from)
    }

    fn leave_insert(&mut self, mode: Mode) {
        self.vi.leave_insert(self.registers, mode);
    }

    fn enter_visual(&mut self, _mode: Mode) {
        self.vi.anchor = self.vi.buffer.caret();
    }

    fn changed(&mut self, from: Mode, to: Mode) {
        if let Some(host) = self.vi.host.as_mut() {
            host.mode_changed(from, to);
        }
    }
}

/// Replays macro commands through the dispatcher.
struct Replay<'a, B: TextBuffer> {
    vi: &'a mut Vi<B>,
    registers: &'a mut Registers,
}

impl<B: TextBuffer> MacroContext for Replay<'_, B> {
    fn replay(&mut self, command: &str) -> bool {
        self.vi.run(self.registers, command)
    }

    fn registers(&mut self) -> &mut Registers {
        &mut *self.registers
    }

    fn prompt(&mut self, name: &str, default: &str) -> Option<String> {
        self.vi.host.as_mut()?.prompt(name, default)
    }

    fn file_name(&self) -> Option<String> {
        self.vi.buffer.name()
    }
}

fn alias(body: &str) -> String {
    let mut chars = body.chars();
    match chars.next().and_then(|c| ALIASES.iter().find(|(key, _)| *key == c)) {
        Some((_, expansion)) => format!("{expansion}{}", chars.as_str()),
        None => body.to_string(),
    }
}

fn ordered<T: Ord>(a: T, b: T) -> (T, T) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}

/// Position right after `text` inserted at `at`.
fn end_of(at: Cursor, text: &str) -> Cursor {
    match text.rfind('\n') {
        Some(i) => Cursor::new(at.line + text.matches('\n').count(), text[i + 1..].chars().count()),
        None => Cursor::new(at.line, at.column + text.chars().count()),
    }
}

fn leading_blanks(line: &str) -> String {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

fn flip_case(c: char) -> char {
    if c.is_uppercase() {
        c.to_lowercase().next().unwrap_or(c)
    } else {
        c.to_uppercase().next().unwrap_or(c)
    }
}
