use tracing::trace;

pub const ESCAPE: &str = "\x1b";
pub const CTRL_V: char = '\x16';

/// Keys that enter an insert-family state from COMMAND or VISUAL_BLOCK.
pub const INSERT_TRIGGERS: &str = "acioACIOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Command,
    Insert,
    InsertBlock,
    Visual,
    VisualLine,
    VisualBlock,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Command => "COMMAND",
            Mode::Insert => "INSERT",
            Mode::InsertBlock => "INSERT BLOCK",
            Mode::Visual => "VISUAL",
            Mode::VisualLine => "VISUAL LINE",
            Mode::VisualBlock => "VISUAL BLOCK",
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Mode::Insert | Mode::InsertBlock)
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, Mode::Visual | Mode::VisualLine | Mode::VisualBlock)
    }
}

/// Callbacks the state machine runs on transitions.
pub trait ModeHooks {
    fn read_only(&self) -> bool;

    /// Runs before an insert-family state is entered. Performs the trigger's
    /// own edit (opening a line, deleting a change span) and returns how many
    /// characters of `command` the trigger used, or `None` when the trigger
    /// is incomplete or invalid. Nothing may be mutated when returning `None`.
    fn enter_insert(&mut self, command: &str, from: Mode) -> Option<usize>;

    /// Runs after an insert-family state was left.
    fn leave_insert(&mut self, mode: Mode);

    fn enter_visual(&mut self, _mode: Mode) {}

    fn changed(&mut self, _from: Mode, _to: Mode) {}
}

/// The vi mode of one editing session.
#[derive(Debug, Clone, Default)]
pub struct ModeMachine {
    mode: Mode,
    consumed: usize,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Mode {
        self.mode
    }

    pub fn is_insert(&self) -> bool {
        self.mode.is_insert()
    }

    pub fn is_visual(&self) -> bool {
        self.mode.is_visual()
    }

    /// Characters used by the trigger of the last accepted transition.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feeds `command` to the transition table.
    ///
    /// Returns true when `command` starts with a trigger the current state
    /// understands, even if a hook vetoed the change; check [`get`](Self::get)
    /// for the effective state.
    pub fn transition(&mut self, command: &str, hooks: &mut dyn ModeHooks) -> bool {
        let Some(first) = command.chars().next() else {
            return false;
        };
        self.consumed = 0;

        if command.starts_with(ESCAPE) {
            let to = match self.mode {
                Mode::Insert | Mode::Visual | Mode::VisualLine | Mode::VisualBlock => Mode::Command,
                Mode::InsertBlock => Mode::VisualBlock,
                Mode::Command => return false,
            };
            self.consumed = ESCAPE.len();
            self.set(to, hooks);
            return true;
        }

        let to = match (self.mode, first) {
            (Mode::Command, c) if INSERT_TRIGGERS.contains(c) => Mode::Insert,
            (Mode::VisualBlock, c) if INSERT_TRIGGERS.contains(c) => Mode::InsertBlock,
            (Mode::Visual | Mode::VisualLine, 'c') => Mode::Insert,
            (Mode::Command, 'v') => Mode::Visual,
            (Mode::Command, 'V') => Mode::VisualLine,
            (Mode::Command, 'K') | (Mode::Command, CTRL_V) => Mode::VisualBlock,
            _ => return false,
        };

        if to.is_insert() {
            if hooks.read_only() {
                trace!(command, "insert vetoed on read-only buffer");
                self.consumed = command.len();
                return true;
            }
            match hooks.enter_insert(command, self.mode) {
                Some(consumed) => self.consumed = consumed,
                None => return false,
            }
        } else {
            self.consumed = first.len_utf8();
            hooks.enter_visual(to);
        }
        self.set(to, hooks);
        true
    }

    fn set(&mut self, to: Mode, hooks: &mut dyn ModeHooks) {
        let from = self.mode;
        self.mode = to;
        if from.is_insert() && !to.is_insert() {
            hooks.leave_insert(from);
        }
        if from != to {
            trace!(from = from.name(), to = to.name(), "mode change");
            hooks.changed(from, to);
        }
    }
}
