//! Register storage.
//!
//! - `"` (unnamed): default target of yank, delete and put
//! - `0`: last yank; `1`-`9`: delete history, newest first
//! - `-`: small delete (less than one line)
//! - `a`-`z`: named, `A`-`Z` appends to the lower-case register
//! - `+` / `*`: clipboard slots, synchronised by the host
//! - `_`: black hole, writes are discarded
//! - `.` last inserted text, `:` last ex command, `/` last search, `=` last
//!   calculation
//!
//! Besides the keyed registers a [`Registers`] value keeps the reserved
//! slots for dot-repeat, the last `f`/`t` search and the last macro played.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Register {
    pub content: String,
    /// Whole lines, put above/below instead of inside the current line.
    pub linewise: bool,
}

impl Register {
    pub fn new(content: impl Into<String>, linewise: bool) -> Self {
        Self {
            content: content.into(),
            linewise,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.content
            .strip_suffix('\n')
            .unwrap_or(&self.content)
            .split('\n')
            .map(String::from)
            .collect()
    }
}

/// A remembered `f`, `F`, `t` or `T` search, replayed by `;` and `,`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindChar {
    pub command: char,
    pub target: char,
}

impl FindChar {
    pub fn reversed(&self) -> Self {
        let command = match self.command {
            'f' => 'F',
            'F' => 'f',
            't' => 'T',
            _ => 't',
        };
        Self {
            command,
            target: self.target,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registers {
    keyed: HashMap<char, Register>,
    numbered: [Register; 10],
    last_command: Option<String>,
    last_find: Option<FindChar>,
    last_macro: Option<char>,
    search_backward: bool,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(name: char) -> bool {
        name.is_ascii_alphanumeric() || "\"-+*_.:/=".contains(name)
    }

    pub fn get(&self, name: char) -> Option<&Register> {
        let reg = match name {
            '0'..='9' => name.to_digit(10).map(|i| &self.numbered[i as usize]),
            'A'..='Z' => self.keyed.get(&name.to_ascii_lowercase()),
            '_' => None,
            _ => self.keyed.get(&name),
        };
        reg.filter(|r| !r.is_empty())
    }

    pub fn set(&mut self, name: char, content: impl Into<String>, linewise: bool) {
        let content = content.into();
        match name {
            '_' => {}
            '0'..='9' => {
                if let Some(i) = name.to_digit(10) {
                    self.numbered[i as usize] = Register::new(content, linewise);
                }
            }
            'A'..='Z' => {
                let reg = self.keyed.entry(name.to_ascii_lowercase()).or_default();
                if linewise && !reg.linewise && !reg.content.is_empty() && !reg.content.ends_with('\n') {
                    reg.content.push('\n');
                }
                reg.content.push_str(&content);
                reg.linewise |= linewise;
            }
            _ => {
                self.keyed.insert(name, Register::new(content, linewise));
            }
        }
    }

    /// Stores yanked text into `name` (`0` when none is given) and the
    /// unnamed register.
    pub fn yank(&mut self, name: Option<char>, content: &str, linewise: bool) {
        match name {
            Some('_') => return,
            Some(name) if name != '"' => self.set(name, content, linewise),
            _ => self.set('0', content, linewise),
        }
        self.set('"', content, linewise);
    }

    /// Stores deleted text, rotating the numbered registers for multi-line
    /// deletes and using `-` for small ones.
    pub fn delete(&mut self, name: Option<char>, content: &str, linewise: bool) {
        match name {
            Some('_') => return,
            Some(name) if name != '"' => self.set(name, content, linewise),
            _ if linewise || content.contains('\n') => {
                self.numbered[1..].rotate_right(1);
                self.numbered[1] = Register::new(content, linewise);
            }
            _ => self.set('-', content, linewise),
        }
        self.set('"', content, linewise);
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    pub fn set_last_command(&mut self, command: impl Into<String>) {
        self.last_command = Some(command.into());
    }

    pub fn last_find(&self) -> Option<FindChar> {
        self.last_find
    }

    pub fn set_last_find(&mut self, find: FindChar) {
        self.last_find = Some(find);
    }

    pub fn last_macro(&self) -> Option<char> {
        self.last_macro
    }

    pub fn set_last_macro(&mut self, name: char) {
        self.last_macro = Some(name);
    }

    pub fn search(&self) -> Option<&str> {
        self.get('/').map(|r| r.content.as_str())
    }

    pub fn set_search(&mut self, pattern: &str) {
        self.set('/', pattern, false);
    }

    /// Direction of the last `/` or `?`, followed by `n`.
    pub fn search_forward(&self) -> bool {
        !self.search_backward
    }

    pub fn set_search_forward(&mut self, forward: bool) {
        self.search_backward = !forward;
    }
}
