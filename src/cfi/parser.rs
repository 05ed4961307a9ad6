//! CFI parser
//!
//! ```text
//! cfi    = "epubcfi(" path [ "," local "," local ] ")"
//! path   = step* [ ":" number [ assertion ] ]
//! step   = "/" number [ "[" id "]" ] | "!"
//! local  = path
//! ```
//!
//! Text-location assertions after an offset are accepted and dropped; the
//! engine re-resolves positions from the offset alone. Temporal and spatial
//! offsets are rejected.

use thiserror::Error;

use super::types::{Cfi, CfiPath, CfiRange, CfiStep};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfiParseError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must start with 'epubcfi('")]
    MissingPrefix,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Range start and end must both be present")]
    InvalidRange,
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> CfiParseError {
        match self.peek() {
            Some(c) => CfiParseError::UnexpectedChar(c, self.pos),
            None => CfiParseError::MissingClosingParen,
        }
    }

    fn number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        let digits = self.input[start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        self.pos += digits;
        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    /// Bracketed text with `^` escapes; the opening `[` is already consumed
    fn bracketed(&mut self) -> Result<String, CfiParseError> {
        let open = self.pos - 1;
        let mut out = String::new();
        let mut chars = self.input[self.pos..].char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '^' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                ']' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                _ => out.push(c),
            }
        }
        Err(CfiParseError::UnclosedBracket(open))
    }

    fn path(&mut self) -> Result<CfiPath, CfiParseError> {
        let mut path = CfiPath::default();

        loop {
            if self.eat('/') {
                let index = self.number()?;
                let id = if self.eat('[') {
                    Some(self.bracketed()?)
                } else {
                    None
                };
                path.steps.push(CfiStep::Child { index, id });
            } else if self.eat('!') {
                path.steps.push(CfiStep::Indirection);
            } else {
                break;
            }
        }

        if self.eat(':') {
            path.offset = Some(self.number()?);
            if self.eat('[') {
                self.bracketed()?;
            }
        }
        Ok(path)
    }

    fn cfi(&mut self) -> Result<Cfi, CfiParseError> {
        if !self.input.starts_with("epubcfi(") {
            return Err(CfiParseError::MissingPrefix);
        }
        self.pos = "epubcfi(".len();

        let path = self.path()?;
        let range = if self.eat(',') {
            let start = self.path()?;
            if !self.eat(',') {
                return Err(CfiParseError::InvalidRange);
            }
            let end = self.path()?;
            if is_blank(&start) || is_blank(&end) {
                return Err(CfiParseError::InvalidRange);
            }
            Some(CfiRange { start, end })
        } else {
            None
        };

        if !self.eat(')') {
            return Err(self.unexpected());
        }
        if self.pos != self.input.len() {
            return Err(self.unexpected());
        }
        Ok(Cfi { path, range })
    }
}

fn is_blank(path: &CfiPath) -> bool {
    path.steps.is_empty() && path.offset.is_none()
}

/// Parse a flow-position string
pub fn parse(input: &str) -> Result<Cfi, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }
    Cursor { input, pos: 0 }.cfi()
}

/// Parse, discarding the error
pub fn try_parse(input: &str) -> Option<Cfi> {
    parse(input).ok()
}
