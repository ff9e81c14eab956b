use std::fmt;

use crate::span::Span;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Ident,
    /// Numeric literal, already converted to its value
    Number(i64),
    Colon,
    Semicolon,
    Comma,
    At,
    Newline,
    If,
    Then,
    Else,
    Eof,
}

/// Represents a single "word" inside the source code.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Text exactly as written in the source
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Whether this token ends a statement.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::Number(_) => write!(f, "numeric literal"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::At => write!(f, "`@`"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::If => write!(f, "`IF`"),
            TokenKind::Then => write!(f, "`THEN`"),
            TokenKind::Else => write!(f, "`ELSE`"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}
