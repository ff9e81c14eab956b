use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{self, Result};
use crate::lexer::cursor::Cursor;
use crate::token::{Token, TokenKind};

pub mod cursor;

/// Shapes of text the lexer recognises, in matching order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pattern {
    Whitespace,
    Comment,
    Newline,
    Number,
    Punct,
    Ident,
}

lazy_static! {
    /// Ordered list of anchored patterns. First match wins.
    static ref PATTERNS: Vec<(Pattern, Regex)> = vec![
        (Pattern::Whitespace, Regex::new(r"^[ \t\x0B\x0C]+").unwrap()),
        // `//` and `#` comments both run to end of line
        (Pattern::Comment, Regex::new(r"^(//|#)[^\r\n]*").unwrap()),
        (Pattern::Newline, Regex::new(r"^\r?\n").unwrap()),
        (Pattern::Number, Regex::new(r"^-?(0[xX][0-9A-Fa-f]+|0[bB][01]+|[0-9]+)").unwrap()),
        (Pattern::Punct, Regex::new(r"^[:;,@]").unwrap()),
        (Pattern::Ident, Regex::new(r"^[\p{L}_.][\p{L}\p{N}_]*").unwrap()),
    ];
}

/// Convert source text into a flat token stream, always terminated by [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cursor = Cursor::new(src);
    let mut toks = Vec::new();

    while !cursor.is_eof() {
        let rest = cursor.at_curr_pt();
        let found = PATTERNS
            .iter()
            .find_map(|(pattern, regex)| regex.find(rest).map(|m| (*pattern, m.end())));

        let Some((pattern, len)) = found else {
            // Lone carriage returns are not worth an error
            if rest.starts_with('\r') {
                cursor.bump();
                continue;
            }
            let ch_len = rest.chars().next().map_or(1, char::len_utf8);
            return Err(error::lex_unknown(cursor.span_of(ch_len)).with_source(src));
        };

        let text = &rest[..len];
        let span = cursor.span_of(len);
        let kind = match pattern {
            Pattern::Whitespace | Pattern::Comment => None,
            Pattern::Newline => Some(TokenKind::Newline),
            Pattern::Number => match parse_number(text) {
                Some(val) => Some(TokenKind::Number(val)),
                None => return Err(error::lex_bad_literal(span, text).with_source(src)),
            },
            Pattern::Punct => Some(match text {
                ":" => TokenKind::Colon,
                ";" => TokenKind::Semicolon,
                "," => TokenKind::Comma,
                _ => TokenKind::At,
            }),
            Pattern::Ident => Some(keyword(text).unwrap_or(TokenKind::Ident)),
        };
        if let Some(kind) = kind {
            toks.push(Token::new(kind, text, span));
        }
        cursor.advance(len);
    }

    toks.push(Token::new(TokenKind::Eof, "", cursor.span_of(0)));
    Ok(toks)
}

fn keyword(text: &str) -> Option<TokenKind> {
    if text.eq_ignore_ascii_case("if") {
        Some(TokenKind::If)
    } else if text.eq_ignore_ascii_case("then") {
        Some(TokenKind::Then)
    } else if text.eq_ignore_ascii_case("else") {
        Some(TokenKind::Else)
    } else {
        None
    }
}

/// Convert a literal matched by the number pattern to its value. `None` on overflow.
pub(crate) fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        (2, bin)
    } else {
        (10, digits)
    };
    let val = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -val } else { val })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|tok| tok.kind).collect()
    }

    #[test]
    fn basic_statement() {
        assert_eq!(
            kinds("start: POB @x, 0x1F // load\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::At,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Number(31),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("-12 0b101 0XfF 7"),
            vec![
                TokenKind::Number(-12),
                TokenKind::Number(5),
                TokenKind::Number(255),
                TokenKind::Number(7),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_any_case() {
        assert_eq!(
            kinds("if Z Then @a eLsE @b"),
            vec![
                TokenKind::If,
                TokenKind::Ident,
                TokenKind::Then,
                TokenKind::At,
                TokenKind::Ident,
                TokenKind::Else,
                TokenKind::At,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unicode_identifiers_and_directives() {
        let toks = tokenize("pętla: .RST 1").unwrap();
        assert_eq!(toks[0].text, "pętla");
        assert_eq!(toks[2].text, ".RST");
        // Column counts characters, not bytes
        assert_eq!(toks[2].span.col(), 8);
    }

    #[test]
    fn line_tracking() {
        let toks = tokenize("a\r\n  b # note\nc").unwrap();
        let b = toks.iter().find(|tok| tok.text == "b").unwrap();
        assert_eq!((b.span.line(), b.span.col()), (2, 3));
        let c = toks.iter().find(|tok| tok.text == "c").unwrap();
        assert_eq!((c.span.line(), c.span.col()), (3, 1));
    }

    #[test]
    fn bare_carriage_return_skipped() {
        assert_eq!(
            kinds("a\rb"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn unknown_character() {
        let err = tokenize("POB 1\nDOD $").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert_eq!(err.code(), "lex::unknown");
        let loc = err.location().unwrap();
        assert_eq!((loc.line, loc.col, loc.length), (2, 5, 1));
    }

    #[test]
    fn overflowing_literal() {
        let err = tokenize("RST 99999999999999999999999").unwrap_err();
        assert_eq!(err.code(), "lex::bad_literal");
    }

    #[test]
    fn retokenizing_token_text_is_stable() {
        let src = "loop: DOD @x, 3 ; SOZ loop // tail\n# full line\nIF N THEN @loop ELSE end\n";
        let first = tokenize(src).unwrap();
        let joined = first
            .iter()
            .map(|tok| tok.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let second = tokenize(&joined).unwrap();
        let strip = |toks: &[Token]| {
            toks.iter()
                .map(|tok| (tok.kind, tok.text.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first), strip(&second));
    }
}
