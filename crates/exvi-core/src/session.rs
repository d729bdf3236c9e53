use crate::macros::Macros;
use crate::mode::Mode;
use crate::register::Registers;

/// State that outlives single dispatcher calls: registers (with the last
/// command, find and macro slots) and the macro engine. A new session
/// starts empty.
#[derive(Debug, Default)]
pub struct Session {
    pub registers: Registers,
    pub macros: Macros,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Services of the host editor. Every method has a do-nothing default.
pub trait Host {
    fn mode_changed(&mut self, _from: Mode, _to: Mode) {}

    /// Runs a `!` command. Returns false when the host cannot run it.
    fn exec(&mut self, _command: &str) -> bool {
        false
    }

    /// Asks the user for the value of a template variable.
    fn prompt(&mut self, _name: &str, _default: &str) -> Option<String> {
        None
    }
}
