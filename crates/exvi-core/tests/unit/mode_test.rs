//! Mode state machine tests
//!
//! Source: src/mode.rs
//! Covers: the transition table, read-only veto, hooks, host notification

use super::{run, vi};
use exvi_core::mode::{CTRL_V, ESCAPE, INSERT_TRIGGERS};
use exvi_core::{Host, Mode, ModeHooks, ModeMachine, TextBuffer};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Hooks {
    read_only: bool,
    refuse: bool,
    changes: Vec<(Mode, Mode)>,
    left: Vec<Mode>,
}

impl ModeHooks for Hooks {
    fn read_only(&self) -> bool {
        self.read_only
    }

    fn enter_insert(&mut self, _command: &str, _from: Mode) -> Option<usize> {
        (!self.refuse).then_some(1)
    }

    fn leave_insert(&mut self, mode: Mode) {
        self.left.push(mode);
    }

    fn changed(&mut self, from: Mode, to: Mode) {
        self.changes.push((from, to));
    }
}

/// A machine driven into `mode` through its own transitions.
fn machine_in(mode: Mode) -> ModeMachine {
    let mut machine = ModeMachine::new();
    let mut hooks = Hooks::default();
    let path: &[&str] = match mode {
        Mode::Command => &[],
        Mode::Insert => &["i"],
        Mode::Visual => &["v"],
        Mode::VisualLine => &["V"],
        Mode::VisualBlock => &["K"],
        Mode::InsertBlock => &["K", "I"],
    };
    for step in path {
        assert!(machine.transition(step, &mut hooks));
    }
    assert_eq!(machine.get(), mode);
    machine
}

const MODES: [Mode; 6] = [
    Mode::Command,
    Mode::Insert,
    Mode::Visual,
    Mode::VisualLine,
    Mode::VisualBlock,
    Mode::InsertBlock,
];

/// The transition table: target for `input` in `mode`, `None` when the
/// input is not a trigger there.
fn expected(mode: Mode, input: &str) -> Option<Mode> {
    let first = input.chars().next()?;
    if input == ESCAPE {
        return match mode {
            Mode::Command => None,
            Mode::InsertBlock => Some(Mode::VisualBlock),
            _ => Some(Mode::Command),
        };
    }
    match mode {
        Mode::Command if INSERT_TRIGGERS.contains(first) => Some(Mode::Insert),
        Mode::Command if first == 'v' => Some(Mode::Visual),
        Mode::Command if first == 'V' => Some(Mode::VisualLine),
        Mode::Command if first == 'K' || first == CTRL_V => Some(Mode::VisualBlock),
        Mode::VisualBlock if INSERT_TRIGGERS.contains(first) => Some(Mode::InsertBlock),
        Mode::Visual | Mode::VisualLine if first == 'c' => Some(Mode::Insert),
        _ => None,
    }
}

// ==================== transition table ====================

#[test]
fn test_transition_table_is_total() {
    let mut inputs: Vec<String> = INSERT_TRIGGERS.chars().map(String::from).collect();
    for other in ["v", "V", "K", "\x16", ESCAPE, "x", "d", ":", "q"] {
        inputs.push(other.to_string());
    }
    for mode in MODES {
        for input in &inputs {
            let mut machine = machine_in(mode);
            let mut hooks = Hooks::default();
            let understood = machine.transition(input, &mut hooks);
            match expected(mode, input) {
                Some(to) => {
                    assert!(understood, "{mode:?} + {input:?}");
                    assert_eq!(machine.get(), to, "{mode:?} + {input:?}");
                }
                None => {
                    assert!(!understood, "{mode:?} + {input:?}");
                    assert_eq!(machine.get(), mode, "{mode:?} + {input:?}");
                }
            }
        }
    }
}

#[test]
fn test_empty_input_is_not_a_trigger() {
    for mode in MODES {
        let mut machine = machine_in(mode);
        assert!(!machine.transition("", &mut Hooks::default()));
        assert_eq!(machine.get(), mode);
    }
}

#[test]
fn test_consumed_counts_trigger() {
    let mut machine = ModeMachine::new();
    let mut hooks = Hooks::default();
    assert!(machine.transition("vjj", &mut hooks));
    assert_eq!(machine.consumed(), 1);
    assert!(machine.transition("\x1bdd", &mut hooks));
    assert_eq!(machine.consumed(), ESCAPE.len());
}

// ==================== veto and hooks ====================

#[test]
fn test_read_only_veto_is_still_understood() {
    for mode in [Mode::Command, Mode::VisualBlock] {
        let mut machine = machine_in(mode);
        let mut hooks = Hooks {
            read_only: true,
            ..Hooks::default()
        };
        assert!(machine.transition("ihello", &mut hooks));
        assert_eq!(machine.get(), mode);
        assert_eq!(machine.consumed(), "ihello".len());
        assert!(hooks.changes.is_empty());
    }
}

#[test]
fn test_refused_insert_is_not_understood() {
    let mut machine = ModeMachine::new();
    let mut hooks = Hooks {
        refuse: true,
        ..Hooks::default()
    };
    assert!(!machine.transition("c", &mut hooks));
    assert_eq!(machine.get(), Mode::Command);
}

#[test]
fn test_hooks_see_changes() {
    let mut machine = ModeMachine::new();
    let mut hooks = Hooks::default();
    machine.transition("K", &mut hooks);
    machine.transition("A", &mut hooks);
    machine.transition(ESCAPE, &mut hooks);
    machine.transition(ESCAPE, &mut hooks);
    assert_eq!(
        hooks.changes,
        vec![
            (Mode::Command, Mode::VisualBlock),
            (Mode::VisualBlock, Mode::InsertBlock),
            (Mode::InsertBlock, Mode::VisualBlock),
            (Mode::VisualBlock, Mode::Command),
        ]
    );
    assert_eq!(hooks.left, vec![Mode::InsertBlock]);
}

// ==================== through the dispatcher ====================

struct Watcher(Rc<RefCell<Vec<(Mode, Mode)>>>);

impl Host for Watcher {
    fn mode_changed(&mut self, from: Mode, to: Mode) {
        self.0.borrow_mut().push((from, to));
    }
}

#[test]
fn test_host_is_notified() {
    let (mut vi, mut session) = vi("abc\n");
    let seen = Rc::new(RefCell::new(Vec::new()));
    vi.set_host(Box::new(Watcher(Rc::clone(&seen))));
    run(&mut vi, &mut session, &["i", "\x1b", "V", "\x1b"]);
    assert_eq!(
        *seen.borrow(),
        vec![
            (Mode::Command, Mode::Insert),
            (Mode::Insert, Mode::Command),
            (Mode::Command, Mode::VisualLine),
            (Mode::VisualLine, Mode::Command),
        ]
    );
}

#[test]
fn test_read_only_buffer_stays_in_command_mode() {
    let (mut vi, mut session) = vi("abc\n");
    vi.buffer_mut().set_read_only(true);
    assert!(vi.command(&mut session, "ix"));
    assert_eq!(vi.mode().get(), Mode::Command);
    assert!(!vi.command(&mut session, "dd"));
    assert_eq!(vi.buffer().text(), "abc\n");
    assert_eq!(vi.buffer().line_count(), 1);
}
