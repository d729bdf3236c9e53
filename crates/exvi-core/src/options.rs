use crate::buffer::FindFlags;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-dispatcher settings, changed with `:set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub ignore_case: bool,
    /// Patterns are regular expressions; `nomagic` searches plain text.
    pub magic: bool,
    /// Searches started by `n`, `N`, `/` and `?` wrap around the buffer.
    pub wrap_scan: bool,
    pub shift_width: usize,
    pub tab_stop: usize,
    /// `o` and `O` copy the indentation of the current line.
    pub auto_indent: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_case: false,
            magic: true,
            wrap_scan: true,
            shift_width: 4,
            tab_stop: 8,
            auto_indent: false,
        }
    }
}

impl Options {
    pub fn find_flags(&self, forward: bool) -> FindFlags {
        FindFlags {
            forward,
            regex: self.magic,
            ignore_case: self.ignore_case,
            wrap: self.wrap_scan,
        }
    }

    /// Applies one `:set` argument such as `ic`, `nows` or `sw=2`.
    pub fn set(&mut self, option: &str) -> Result<()> {
        if let Some((name, value)) = option.split_once('=') {
            let value: usize = value
                .trim()
                .parse()
                .map_err(|_| Error::Parse(format!("invalid value: {option}")))?;
            match name.trim() {
                "sw" | "shiftwidth" if value > 0 => self.shift_width = value,
                "ts" | "tabstop" if value > 0 => self.tab_stop = value,
                _ => return Err(Error::Parse(format!("unknown option: {option}"))),
            }
            return Ok(());
        }

        let (name, on) = match option.strip_prefix("no") {
            Some(rest) => (rest, false),
            None => (option, true),
        };
        match name {
            "ic" | "ignorecase" => self.ignore_case = on,
            "magic" => self.magic = on,
            "ws" | "wrapscan" => self.wrap_scan = on,
            "ai" | "autoindent" => self.auto_indent = on,
            _ => return Err(Error::Parse(format!("unknown option: {option}"))),
        }
        Ok(())
    }
}
