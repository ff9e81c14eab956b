use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    ast::{Conditional, Directive, Instruction, LabelDef, Node, Operand, OperandKind, Program},
    error::{self, Result},
    lexer::tokenize,
    registry::is_reserved_directive,
    token::{Token, TokenKind},
};

lazy_static! {
    /// Bare identifiers of this shape are registers rather than label references.
    static ref REGISTER_PATTERN: Regex = Regex::new(r"(?i)^(AK|R[0-9]+)$").unwrap();
}

/// Marker that introduces a directive.
pub const DIRECTIVE_MARKER: char = '.';

/// Tokenize and parse a whole source file.
pub fn parse(src: &str) -> Result<Program> {
    let toks = tokenize(src)?;
    AsmParser::new(toks)
        .parse()
        .map_err(|err| err.with_source(src))
}

/// Transforms a token stream into an AST.
pub struct AsmParser {
    /// Always terminated by an `Eof` token
    toks: Vec<Token>,
    /// Index of the next unread token
    pos: usize,
}

impl AsmParser {
    pub fn new(mut toks: Vec<Token>) -> Self {
        if toks.last().map_or(true, |tok| tok.kind != TokenKind::Eof) {
            let span = toks.last().map(|tok| tok.span).unwrap_or_default();
            toks.push(Token::new(TokenKind::Eof, "", span));
        }
        AsmParser { toks, pos: 0 }
    }

    /// Create AST out of token stream. Stops at the first error.
    pub fn parse(mut self) -> Result<Program> {
        let mut body = Vec::new();
        loop {
            self.skip_terminators();
            if self.peek().kind == TokenKind::Eof {
                break;
            }
            self.parse_item(&mut body)?;

            let tok = self.peek();
            if !tok.is_terminator() {
                return Err(error::parse_unexpected(
                    tok.span,
                    "end of statement",
                    tok.kind,
                ));
            }
        }
        Ok(Program { body })
    }

    fn peek(&self) -> &Token {
        &self.toks[self.pos]
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.toks.len() - 1);
        &self.toks[idx]
    }

    /// Consume a token. `Eof` is never consumed.
    fn next(&mut self) -> Token {
        let tok = self.toks[self.pos].clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn skip_terminators(&mut self) {
        while matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.next();
        }
    }

    fn parse_item(&mut self, body: &mut Vec<Node>) -> Result<()> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Colon => Err(error::parse_empty_label(tok.span)),
            TokenKind::Ident if self.peek_nth(1).kind == TokenKind::Colon => {
                self.next();
                let colon = self.next();
                body.push(Node::Label(LabelDef {
                    name: tok.text,
                    line: tok.span.line(),
                    span: tok.span.join(colon.span),
                }));
                // Label may share its line with the statement it names
                if !self.peek().is_terminator() {
                    self.parse_item(body)?;
                }
                Ok(())
            }
            TokenKind::If => {
                let cond = self.parse_conditional()?;
                body.push(Node::Conditional(cond));
                Ok(())
            }
            TokenKind::Ident => {
                let node = if tok.text.starts_with(DIRECTIVE_MARKER)
                    || is_reserved_directive(&tok.text)
                {
                    Node::Directive(self.parse_directive()?)
                } else {
                    Node::Instruction(self.parse_instr()?)
                };
                body.push(node);
                Ok(())
            }
            _ => Err(error::parse_unexpected(
                tok.span,
                "a label, instruction or directive",
                tok.kind,
            )),
        }
    }

    fn parse_instr(&mut self) -> Result<Instruction> {
        let name = self.next();
        let operands = self.parse_operands()?;
        let span = operands
            .last()
            .map_or(name.span, |last| name.span.join(last.span));
        Ok(Instruction {
            name: name.text.to_uppercase(),
            operands,
            line: name.span.line(),
            span,
        })
    }

    fn parse_directive(&mut self) -> Result<Directive> {
        let name = self.next();
        let bare = name.text.trim_start_matches(DIRECTIVE_MARKER);
        if bare.is_empty() {
            return Err(error::parse_unexpected(
                name.span,
                "directive name",
                "`.`",
            ));
        }
        let operands = self.parse_operands()?;
        let span = operands
            .last()
            .map_or(name.span, |last| name.span.join(last.span));
        Ok(Directive {
            name: bare.to_uppercase(),
            operands,
            line: name.span.line(),
            span,
        })
    }

    fn parse_conditional(&mut self) -> Result<Conditional> {
        let kw = self.next();
        let test = self.next();
        if test.kind != TokenKind::Ident {
            return Err(error::parse_condition(
                test.span,
                "Expected a condition flag after `IF`",
            ));
        }
        let then_kw = self.next();
        if then_kw.kind != TokenKind::Then {
            return Err(error::parse_condition(
                then_kw.span,
                "Expected `THEN` after the condition flag",
            ));
        }
        let then_branch = self.parse_operand()?;
        let else_branch = if self.peek().kind == TokenKind::Else {
            self.next();
            Some(self.parse_operand()?)
        } else {
            None
        };
        let end = else_branch.as_ref().unwrap_or(&then_branch).span;
        Ok(Conditional {
            test: test.text,
            test_span: test.span,
            then_branch,
            else_branch,
            line: kw.span.line(),
            span: kw.span.join(end),
        })
    }

    /// Comma-separated operands up to the end of the statement.
    fn parse_operands(&mut self) -> Result<Vec<Operand>> {
        let mut operands = Vec::new();
        if self.peek().is_terminator() {
            return Ok(operands);
        }
        operands.push(self.parse_operand()?);
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Comma => {
                    self.next();
                    operands.push(self.parse_operand()?);
                }
                _ if tok.is_terminator() => break,
                _ => {
                    return Err(error::parse_unexpected(
                        tok.span,
                        "`,` or end of statement",
                        tok.kind,
                    ))
                }
            }
        }
        Ok(operands)
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let tok = self.next();
        let kind = match tok.kind {
            TokenKind::At => {
                if self.peek().kind != TokenKind::Ident {
                    return Err(error::parse_dangling_at(tok.span));
                }
                let name = self.next();
                return Ok(Operand {
                    kind: OperandKind::LabelRef(name.text),
                    span: tok.span.join(name.span),
                });
            }
            TokenKind::Number(val) => OperandKind::Immediate(val),
            TokenKind::Ident if REGISTER_PATTERN.is_match(&tok.text) => {
                OperandKind::Register(tok.text.to_uppercase())
            }
            TokenKind::Ident => OperandKind::LabelRef(tok.text),
            TokenKind::Comma => return Err(error::parse_stray_comma(tok.span)),
            other => return Err(error::parse_operand(tok.span, other)),
        };
        Ok(Operand {
            kind,
            span: tok.span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ops(node: &Node) -> Vec<OperandKind> {
        match node {
            Node::Instruction(instr) => instr.operands.iter().map(|op| op.kind.clone()).collect(),
            Node::Directive(dir) => dir.operands.iter().map(|op| op.kind.clone()).collect(),
            _ => panic!("node has no operands"),
        }
    }

    #[test]
    fn parse_label_and_instruction() {
        let program = parse("start: POB 10\nSOZ start").unwrap();
        assert_eq!(program.body.len(), 3);
        match &program.body[0] {
            Node::Label(label) => {
                assert_eq!(label.name, "start");
                assert_eq!(label.line, 1);
            }
            other => panic!("expected label, found {other:?}"),
        }
        match &program.body[1] {
            Node::Instruction(instr) => assert_eq!(instr.name, "POB"),
            other => panic!("expected instruction, found {other:?}"),
        }
        assert_eq!(ops(&program.body[1]), vec![OperandKind::Immediate(10)]);
        assert_eq!(
            ops(&program.body[2]),
            vec![OperandKind::LabelRef("start".into())]
        );
        assert_eq!(program.body[2].line(), 2);
    }

    #[test]
    fn parse_operand_shapes() {
        let program = parse("dod @x, ak, y, r7, 0b11").unwrap();
        assert_eq!(
            ops(&program.body[0]),
            vec![
                OperandKind::LabelRef("x".into()),
                OperandKind::Register("AK".into()),
                OperandKind::LabelRef("y".into()),
                OperandKind::Register("R7".into()),
                OperandKind::Immediate(3),
            ]
        );
    }

    #[test]
    fn parse_directives() {
        let program = parse("x: RST 5; y: rpa\n.org 16\nz: .DATA 1, 2, 3").unwrap();
        let names = program
            .body
            .iter()
            .filter_map(|node| match node {
                Node::Directive(dir) => Some(dir.name.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["RST", "RPA", "ORG", "DATA"]);
    }

    #[test]
    fn parse_conditional() {
        let program = parse("IF z THEN @a ELSE b").unwrap();
        match &program.body[0] {
            Node::Conditional(cond) => {
                assert_eq!(cond.test, "z");
                assert_eq!(cond.then_branch.kind, OperandKind::LabelRef("a".into()));
                assert_eq!(
                    cond.else_branch.as_ref().map(|op| op.kind.clone()),
                    Some(OperandKind::LabelRef("b".into()))
                );
            }
            other => panic!("expected conditional, found {other:?}"),
        }
        let program = parse("IF N THEN 4").unwrap();
        assert!(matches!(
            &program.body[0],
            Node::Conditional(Conditional { else_branch: None, .. })
        ));
    }

    #[test]
    fn parse_label_alone_on_line() {
        let program = parse("x:\n  RST 1").unwrap();
        assert!(matches!(program.body[0], Node::Label(_)));
        assert!(matches!(program.body[1], Node::Directive(_)));
    }

    #[test]
    fn parse_errors() {
        let cases = [
            (": POB 1", "parse::empty_label"),
            ("POB @", "parse::dangling_at"),
            ("POB @ 1", "parse::dangling_at"),
            ("POB ,1", "parse::stray_comma"),
            ("POB 1,,2", "parse::stray_comma"),
            ("POB 1,", "parse::operand"),
            ("POB 1 2", "parse::unexpected"),
            ("10", "parse::unexpected"),
            ("IF THEN @a", "parse::condition"),
            ("IF Z @a", "parse::condition"),
        ];
        for (src, code) in cases {
            let err = parse(src).unwrap_err();
            assert_eq!(err.code(), code, "source: {src}");
            assert_eq!(err.kind(), ErrorKind::Syntax);
        }
    }

    #[test]
    fn error_reports_first_problem_only() {
        let err = parse("POB ,\nDOD @").unwrap_err();
        assert_eq!(err.code(), "parse::stray_comma");
        assert_eq!(err.location().unwrap().line, 1);
    }
}
