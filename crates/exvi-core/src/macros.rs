//! Recording and playback of named command sequences (`qx`, `q`, `@x`).
//!
//! Playback walks an explicit stack of frames: a recorded `@y` pushes a
//! frame for `y` instead of recursing, and the stack depth is bounded by
//! [`Macros::max_depth`].

use crate::command::parse_count;
use crate::error::{Error, Result};
use crate::register::Registers;
use crate::store::{MacroStore, StoredMacros};
use crate::variable::Variables;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What the engine needs from the dispatcher while replaying.
pub trait MacroContext {
    /// Executes one recorded command; false stops playback.
    fn replay(&mut self, command: &str) -> bool;

    fn registers(&mut self) -> &mut Registers;

    fn prompt(&mut self, _name: &str, _default: &str) -> Option<String> {
        None
    }

    fn file_name(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacroState {
    #[default]
    Idle,
    Recording(char),
}

struct Frame {
    commands: Vec<String>,
    next: usize,
    remaining: usize,
}

impl Frame {
    fn new(commands: Vec<String>, repeat: usize) -> Self {
        Self {
            commands,
            next: 0,
            remaining: repeat.max(1),
        }
    }
}

#[derive(Debug)]
pub struct Macros {
    state: MacroState,
    recording: Vec<String>,
    map: BTreeMap<char, Vec<String>>,
    variables: Variables,
    playback: bool,
    max_depth: usize,
}

impl Default for Macros {
    fn default() -> Self {
        Self {
            state: MacroState::Idle,
            recording: Vec::new(),
            map: BTreeMap::new(),
            variables: Variables::new(),
            playback: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Macros {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth.max(1);
    }

    pub fn state(&self) -> MacroState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, MacroState::Recording(_))
    }

    pub fn is_playback(&self) -> bool {
        self.playback
    }

    /// Name of the macro being recorded.
    pub fn get_macro(&self) -> Option<char> {
        match self.state {
            MacroState::Recording(name) => Some(name),
            MacroState::Idle => None,
        }
    }

    pub fn get(&self, name: char) -> Option<&[String]> {
        self.map.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn set(&mut self, name: char, commands: Vec<String>) {
        self.map.insert(name.to_ascii_lowercase(), commands);
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Feeds one command to the engine and returns how many characters it
    /// consumed (0: not a macro command).
    ///
    /// `q{x}` starts recording, `q` while recording commits, `@{x}` replays
    /// `repeat` times and needs `ctx`. Any other complete command is appended
    /// to the recording.
    pub fn transition(
        &mut self,
        command: &str,
        ctx: Option<&mut dyn MacroContext>,
        complete: bool,
        repeat: usize,
    ) -> usize {
        let mut chars = command.chars();
        match (chars.next(), self.state) {
            (Some('q'), MacroState::Recording(name)) => {
                let commands = std::mem::take(&mut self.recording);
                info!(name = %name, commands = commands.len(), "macro recorded");
                self.map.insert(name, commands);
                self.state = MacroState::Idle;
                1
            }
            (Some('q'), MacroState::Idle) => {
                let Some(name) = chars.next().filter(char::is_ascii_alphanumeric) else {
                    return 0;
                };
                let key = name.to_ascii_lowercase();
                self.recording = if name.is_ascii_uppercase() {
                    self.map.get(&key).cloned().unwrap_or_default()
                } else {
                    Vec::new()
                };
                info!(name = %key, append = name.is_ascii_uppercase(), "macro recording");
                self.state = MacroState::Recording(key);
                2
            }
            (Some('@'), MacroState::Idle) => {
                let Some(ctx) = ctx else {
                    return 0;
                };
                let Some(selector) = chars.next() else {
                    return 0;
                };
                match self.play(ctx, selector, repeat) {
                    Ok(()) => 1 + selector.len_utf8(),
                    Err(Error::UnknownMacro(name)) => {
                        debug!(name = %name, "unknown macro");
                        0
                    }
                    Err(e) => {
                        debug!(error = %e, "macro playback stopped");
                        1 + selector.len_utf8()
                    }
                }
            }
            _ => {
                if complete {
                    self.record(command);
                }
                0
            }
        }
    }

    /// Appends a complete command to the macro being recorded, if any. The
    /// text is never read as `q` or `@`.
    pub fn record(&mut self, command: &str) {
        if self.is_recording() {
            self.recording.push(command.to_string());
        }
    }

    fn lookup(&self, ctx: &mut dyn MacroContext, selector: char) -> Result<(char, Vec<String>)> {
        let name = if selector == '@' {
            ctx.registers().last_macro().ok_or(Error::UnknownMacro('@'))?
        } else {
            selector.to_ascii_lowercase()
        };
        let commands = self.map.get(&name).cloned().ok_or(Error::UnknownMacro(name))?;
        Ok((name, commands))
    }

    fn play(&mut self, ctx: &mut dyn MacroContext, selector: char, repeat: usize) -> Result<()> {
        let (name, commands) = self.lookup(ctx, selector)?;
        ctx.registers().set_last_macro(name);
        self.playback = true;
        let result = self.run(ctx, Frame::new(commands, repeat));
        self.playback = false;
        result
    }

    fn run(&mut self, ctx: &mut dyn MacroContext, first: Frame) -> Result<()> {
        let mut stack = vec![first];
        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.commands.len() {
                if frame.remaining > 1 {
                    frame.remaining -= 1;
                    frame.next = 0;
                } else {
                    stack.pop();
                }
                continue;
            }
            let command = frame.commands[frame.next].clone();
            frame.next += 1;

            let (count, body) = parse_count(&command);
            if let Some(selector) = body.strip_prefix('@').and_then(|s| s.chars().next()) {
                if stack.len() >= self.max_depth {
                    return Err(Error::MacroDepth(self.max_depth));
                }
                let (name, commands) = self.lookup(ctx, selector)?;
                ctx.registers().set_last_macro(name);
                stack.push(Frame::new(commands, count.unwrap_or(1)));
                continue;
            }

            let expanded = self.expand_all(ctx, &command)?;
            if !ctx.replay(&expanded) {
                return Err(Error::Parse(format!("replayed command failed: {expanded}")));
            }
        }
        Ok(())
    }

    /// Resolves `variable` and appends its value to `out`. On failure `out`
    /// is left untouched.
    pub fn expand(&mut self, ctx: &mut dyn MacroContext, variable: &str, out: &mut String) -> bool {
        match self.variables.resolve(variable, ctx) {
            Some(value) => {
                out.push_str(&value);
                true
            }
            None => false,
        }
    }

    fn expand_all(&mut self, ctx: &mut dyn MacroContext, command: &str) -> Result<String> {
        let mut out = String::with_capacity(command.len());
        let mut rest = command;
        while let Some(start) = rest.find("$(") {
            let Some(len) = rest[start + 2..].find(')') else {
                break;
            };
            out.push_str(&rest[..start]);
            let name = &rest[start + 2..start + 2 + len];
            if !self.expand(ctx, name, &mut out) {
                return Err(Error::Variable(name.to_string()));
            }
            rest = &rest[start + 3 + len..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Replaces the recorded macros and variables with the store's content.
    pub fn load(&mut self, store: &dyn MacroStore) -> bool {
        let stored = match store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "loading macros failed");
                return false;
            }
        };
        self.map = stored
            .macros
            .into_iter()
            .filter_map(|(name, commands)| {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some((c.to_ascii_lowercase(), commands)),
                    _ => {
                        warn!(name, "skipping macro with invalid name");
                        None
                    }
                }
            })
            .collect();
        self.variables = Variables::new();
        for variable in stored.variables {
            self.variables.define(variable);
        }
        true
    }

    pub fn save(&self, store: &mut dyn MacroStore) -> bool {
        let stored = StoredMacros {
            macros: self
                .map
                .iter()
                .map(|(name, commands)| (name.to_string(), commands.clone()))
                .collect(),
            variables: self.variables.iter().cloned().collect(),
        };
        match store.save(&stored) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "saving macros failed");
                false
            }
        }
    }
}
