//! Integer expressions for the `=` command.
//!
//! `+ - * / %` with the usual precedence, unary minus, parentheses, and the
//! line terms `.` (current line), `$` (last line) and `'x` (marker line).

use crate::buffer::TextBuffer;
use crate::error::{Error, Result};

pub fn evaluate(expr: &str, buffer: &dyn TextBuffer) -> Result<i64> {
    let mut calc = Calc {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        buffer,
    };
    let value = calc.sum()?;
    match calc.peek() {
        None => Ok(value),
        Some(c) => Err(Error::Parse(format!("unexpected '{c}' in {expr}"))),
    }
}

struct Calc<'a> {
    chars: Vec<char>,
    pos: usize,
    buffer: &'a dyn TextBuffer,
}

impl Calc<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn sum(&mut self) -> Result<i64> {
        let mut value = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            value = if op == '+' {
                value.checked_add(rhs)
            } else {
                value.checked_sub(rhs)
            }
            .ok_or_else(overflow)?;
        }
        Ok(value)
    }

    fn product(&mut self) -> Result<i64> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value.checked_mul(rhs).ok_or_else(overflow)?,
                _ if rhs == 0 => return Err(Error::Parse("division by zero".into())),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<i64> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                self.unary()?.checked_neg().ok_or_else(overflow)
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<i64> {
        match self.next() {
            Some('(') => {
                let value = self.sum()?;
                match self.next() {
                    Some(')') => Ok(value),
                    _ => Err(Error::Parse("missing ')'".into())),
                }
            }
            Some('.') => Ok(self.buffer.caret().line as i64 + 1),
            Some('$') => Ok(self.buffer.line_count() as i64),
            Some('\'') => {
                let name = self.next().ok_or_else(|| Error::Parse("missing marker name".into()))?;
                self.buffer
                    .marker(name)
                    .map(|at| at.line as i64 + 1)
                    .ok_or(Error::UnknownMarker(name))
            }
            Some(c) if c.is_ascii_digit() => {
                let mut value = i64::from(c as u8 - b'0');
                while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
                    self.pos += 1;
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i64::from(d)))
                        .ok_or_else(overflow)?;
                }
                Ok(value)
            }
            Some(c) => Err(Error::Parse(format!("unexpected '{c}'"))),
            None => Err(Error::Parse("missing operand".into())),
        }
    }
}

fn overflow() -> Error {
    Error::Parse("integer overflow".into())
}
