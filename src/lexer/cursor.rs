//! Taken from the lexer in https://github.com/rozukke/mimi
// Adapted to carry line and column information alongside the byte position.

use crate::span::{Idx, Span};

/// Position-tracking view over a source string.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    /// Source being read
    chars: &'a str,
    /// Byte index that the cursor is pointing to in the source
    curr_pt: usize,
    /// 1-based line of `curr_pt`
    line: u32,
    /// 1-based column of `curr_pt`, in characters
    col: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            chars: input,
            curr_pt: 0,
            line: 1,
            col: 1,
        }
    }

    /// File is finished lexing
    pub fn is_eof(&self) -> bool {
        self.curr_pt >= self.chars.len()
    }

    /// Return slice of input starting at the current point of the cursor
    pub fn at_curr_pt(&self) -> &'a str {
        &self.chars[self.curr_pt..]
    }

    /// Span of the next `len` bytes, starting at the cursor.
    pub fn span_of(&self, len: usize) -> Span {
        Span::new(Idx(self.curr_pt as u32), len as u32, self.line, self.col)
    }

    /// Move cursor ahead by `len` bytes, keeping line and column in step with any newlines
    /// inside the skipped text.
    pub fn advance(&mut self, len: usize) {
        let skipped = &self.chars[self.curr_pt..self.curr_pt + len];
        for ch in skipped.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.curr_pt += len;
    }

    /// Advance by one character
    pub fn bump(&mut self) {
        if let Some(ch) = self.at_curr_pt().chars().next() {
            self.advance(ch.len_utf8());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_inside_one_advance() {
        let mut cursor = Cursor::new("ab\ncd\nef");
        cursor.advance(7);
        let span = cursor.span_of(1);
        assert_eq!((span.line(), span.col()), (3, 2));
        assert_eq!(cursor.at_curr_pt(), "f");
    }

    #[test]
    fn bump_counts_characters() {
        let mut cursor = Cursor::new("żx");
        cursor.bump();
        assert_eq!(cursor.span_of(1).col(), 2);
        assert_eq!(cursor.at_curr_pt(), "x");
    }
}
