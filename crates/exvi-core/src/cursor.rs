use crate::buffer::TextBuffer;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// A caret or marker position: 0-based line and 0-based character column.
///
/// Ordering is by line, then column, so spans can be normalised with
/// `min`/`max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn at_origin() -> Self {
        Self::new(0, 0)
    }

    pub fn move_left(&mut self, count: usize) -> bool {
        if self.column == 0 {
            return false;
        }
        self.column = self.column.saturating_sub(count);
        true
    }

    /// Moves right within the line, stopping on the last character.
    pub fn move_right(&mut self, buffer: &dyn TextBuffer, count: usize) -> bool {
        let max_col = buffer.line_len(self.line).saturating_sub(1);
        if self.column >= max_col {
            return false;
        }
        self.column = (self.column + count).min(max_col);
        true
    }

    pub fn move_up(&mut self, buffer: &dyn TextBuffer, count: usize, want: usize) -> bool {
        if self.line == 0 {
            return false;
        }
        self.line = self.line.saturating_sub(count);
        self.column = want;
        self.ensure_valid(buffer);
        true
    }

    pub fn move_down(&mut self, buffer: &dyn TextBuffer, count: usize, want: usize) -> bool {
        let last = buffer.line_count().saturating_sub(1);
        if self.line >= last {
            return false;
        }
        self.line = (self.line + count).min(last);
        self.column = want;
        self.ensure_valid(buffer);
        true
    }

    pub fn move_to_first_non_blank(&mut self, buffer: &dyn TextBuffer) {
        self.column = first_non_blank(buffer, self.line);
    }

    /// Clamps the cursor onto an existing character (command-mode rules).
    pub fn ensure_valid(&mut self, buffer: &dyn TextBuffer) {
        let max_line = buffer.line_count().saturating_sub(1);
        self.line = self.line.min(max_line);
        let max_col = buffer.line_len(self.line).saturating_sub(1);
        self.column = self.column.min(max_col);
    }

    /// Screen column of this cursor. Wide characters take two cells and a
    /// tab runs to the next multiple of `tab_stop`.
    pub fn display_column(&self, buffer: &dyn TextBuffer, tab_stop: usize) -> usize {
        buffer
            .line(self.line)
            .map(|text| {
                text.chars()
                    .take(self.column)
                    .fold(0, |at, c| at + cell_width(c, at, tab_stop))
            })
            .unwrap_or(0)
    }
}

/// Cells taken by `c` when drawn at screen column `at`.
pub fn cell_width(c: char, at: usize, tab_stop: usize) -> usize {
    if c == '\t' {
        let stop = tab_stop.max(1);
        stop - at % stop
    } else {
        c.width().unwrap_or(0)
    }
}

pub fn first_non_blank(buffer: &dyn TextBuffer, line: usize) -> usize {
    buffer
        .line(line)
        .and_then(|text| text.chars().position(|c| !c.is_whitespace()))
        .unwrap_or(0)
}

/// Character column covering screen column `display` on `line`; the line
/// length when the line is narrower.
pub fn column_at_display(buffer: &dyn TextBuffer, line: usize, display: usize, tab_stop: usize) -> usize {
    let Some(text) = buffer.line(line) else {
        return 0;
    };
    let mut width = 0;
    for (idx, c) in text.chars().enumerate() {
        let w = cell_width(c, width, tab_stop);
        if width + w > display {
            return idx;
        }
        width += w;
    }
    text.chars().count()
}
