pub mod address;
pub mod buffer;
pub mod calc;
pub mod command;
pub mod cursor;
pub mod error;
pub mod ex;
pub mod macros;
pub mod mode;
pub mod motion;
pub mod options;
pub mod range;
pub mod register;
pub mod replace;
pub mod session;
pub mod store;
pub mod variable;
pub mod vi;

pub use address::{Address, AddressKind, InsertPoint};
pub use buffer::{FindFlags, Placement, RopeBuffer, TextBuffer};
pub use command::{CommandKind, Target};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use ex::{ExCommand, Verb};
pub use macros::{MacroContext, MacroState, Macros, DEFAULT_MAX_DEPTH};
pub use mode::{Mode, ModeHooks, ModeMachine};
pub use options::Options;
pub use range::AddressRange;
pub use register::{Register, Registers};
pub use session::{Host, Session};
pub use store::{JsonStore, MacroStore, MemoryStore, StoredMacros};
pub use variable::{Variable, VariableKind, Variables};
pub use vi::Vi;
