use std::fmt;

use miette::{GraphicalReportHandler, GraphicalTheme, LabeledSpan, Severity, SourceCode};

use crate::span::Span;

/// Pipeline stage that produced a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
    Registry,
    Generation,
    Runtime,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Level {
    Error,
    Warning,
}

/// Human-facing position of a diagnostic inside its source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Location {
    pub line: u32,
    pub col: u32,
    pub length: u32,
}

/// Structured error or warning, shown to the user verbatim.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    kind: ErrorKind,
    level: Level,
    code: &'static str,
    message: String,
    hint: Option<String>,
    label: Option<String>,
    span: Option<Span>,
    source: Option<String>,
}

pub type Result<T> = std::result::Result<T, Diagnostic>;

impl Diagnostic {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            level: Level::Error,
            code,
            message: message.into(),
            hint: None,
            label: None,
            span: None,
            source: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a labelled location.
    pub fn at(mut self, span: Span, label: impl Into<String>) -> Self {
        self.span = Some(span);
        self.label = Some(label.into());
        self
    }

    /// Attach source code for frame rendering. Existing source is kept.
    pub fn with_source(mut self, src: &str) -> Self {
        if self.source.is_none() && self.span.is_some() {
            self.source = Some(src.to_string());
        }
        self
    }

    pub fn into_warning(mut self) -> Self {
        self.level = Level::Warning;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn location(&self) -> Option<Location> {
        self.span.map(|span| Location {
            line: span.line(),
            col: span.col(),
            length: span.len() as u32,
        })
    }

    /// Multi-line source-context frame, without colour.
    pub fn render_frame(&self) -> String {
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
            .with_context_lines(crate::DIAGNOSTIC_CONTEXT_LINES);
        let mut out = String::new();
        match handler.render_report(&mut out, self) {
            Ok(()) => out,
            Err(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(match self.level {
            Level::Error => Severity::Error,
            Level::Warning => Severity::Warning,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.hint
            .as_ref()
            .map(|hint| Box::new(hint) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.source.as_ref().map(|src| src as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            self.label.clone(),
            span,
        ))))
    }
}

// Lexer errors

pub fn lex_unknown(span: Span) -> Diagnostic {
    Diagnostic::new(ErrorKind::Lexical, "lex::unknown", "Encountered an unknown character")
        .with_hint("comments start with `//` or `#`, labels are referenced with `@`")
        .at(span, "unknown character")
}

pub fn lex_bad_literal(span: Span, text: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Lexical,
        "lex::bad_literal",
        format!("Encountered an invalid numeric literal `{text}`"),
    )
    .with_hint("literals are decimal, `0x` hexadecimal or `0b` binary")
    .at(span, "invalid literal")
}

// Parser errors

pub fn parse_unexpected(span: Span, expected: &str, found: impl fmt::Display) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "parse::unexpected",
        format!("Expected {expected}, found {found}"),
    )
    .with_hint("statements are separated by newlines or `;`")
    .at(span, "unexpected token")
}

pub fn parse_empty_label(span: Span) -> Diagnostic {
    Diagnostic::new(ErrorKind::Syntax, "parse::empty_label", "Label has no name")
        .with_hint("labels are written as `name:`")
        .at(span, "empty label")
}

pub fn parse_dangling_at(span: Span) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "parse::dangling_at",
        "Expected a label name after `@`",
    )
    .with_hint("memory references are written as `@label`")
    .at(span, "dangling `@`")
}

pub fn parse_stray_comma(span: Span) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "parse::stray_comma",
        "Expected an operand, found `,`",
    )
    .with_hint("remove the extra comma")
    .at(span, "stray comma")
}

pub fn parse_operand(span: Span, found: impl fmt::Display) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "parse::operand",
        format!("Malformed operand: found {found}"),
    )
    .with_hint("operands are numbers, registers, `@label` or label names")
    .at(span, "malformed operand")
}

pub fn parse_condition(span: Span, message: &str) -> Diagnostic {
    Diagnostic::new(ErrorKind::Syntax, "parse::condition", message.to_string())
        .with_hint("conditionals are written as `IF flag THEN @label ELSE @label`")
        .at(span, "malformed conditional")
}

// Semantic errors

pub fn sema_duplicate_label(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::duplicate_label",
        format!("Duplicate label `{name}`"),
    )
    .with_hint("labels may only be defined once per program")
    .at(span, "duplicate label")
}

pub fn sema_undefined_symbol(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::undefined_symbol",
        format!("Undefined symbol `{name}`"),
    )
    .with_hint("define the label with `name:` somewhere in the program")
    .at(span, "undefined symbol")
}

pub fn sema_out_of_range(span: Span, value: i64, max: u32) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::out_of_range",
        format!("Operand {value} is out of range"),
    )
    .with_hint(format!("immediates must lie within 0 to {max}"))
    .at(span, "out-of-range operand")
}

pub fn sema_unknown_register(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::unknown_register",
        format!("Unknown register `{name}`"),
    )
    .with_hint("the only register operand is `AK`")
    .at(span, "unknown register")
}

pub fn sema_unlabeled_memory(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::unlabeled_memory",
        format!("Memory declaration `{name}` is not preceded by a label"),
    )
    .with_hint("write the declaration as `name: RST 0`")
    .at(span, "unlabeled declaration")
}

pub fn sema_unknown_flag(span: Span, flag: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::unknown_flag",
        format!("Unknown condition flag `{flag}`"),
    )
    .with_hint("supported flags are Z, N and R")
    .at(span, "unknown flag")
}

pub fn sema_operand_shape(span: Span, context: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::operand_shape",
        format!("Unsupported operand for {context}"),
    )
    .with_hint("this position requires a numeric literal")
    .at(span, "unsupported operand")
}

pub fn sema_unknown_instruction(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::unknown_instruction",
        format!("Unknown instruction `{name}`"),
    )
    .with_hint("check the instruction table for available mnemonics")
    .at(span, "unknown instruction")
}

pub fn sema_arity(span: Span, name: &str, expected: &str, found: usize) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::arity",
        format!("`{name}` expects {expected} operand(s), found {found}"),
    )
    .with_hint("check the operands for this instruction")
    .at(span, "wrong operand count")
}

pub fn sema_overlap(span: Span, addr: u16) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Semantic,
        "sema::overlap",
        format!("Address {addr} is already occupied"),
    )
    .with_hint("check `ORG` directives for regions that overlap")
    .at(span, "overlapping placement")
}

// Registry errors

pub fn registry_empty_name(index: usize) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Registry,
        "registry::empty_name",
        format!("Instruction definition #{index} has an empty name"),
    )
}

pub fn registry_duplicate(name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Registry,
        "registry::duplicate",
        format!("Instruction `{name}` is defined more than once"),
    )
}

pub fn registry_arity(name: &str, detail: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Registry,
        "registry::arity",
        format!("Instruction `{name}` has an invalid operand count: {detail}"),
    )
}

pub fn registry_builtin_override(name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Registry,
        "registry::builtin_override",
        format!("Definition of `{name}` is replaced by the built-in directive"),
    )
    .with_hint("rename the instruction")
    .into_warning()
}

pub fn registry_json(reason: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Registry,
        "registry::json",
        format!("Instruction table is not valid: {reason}"),
    )
    .with_hint("the table is a JSON array of `{\"name\", \"args\", \"kind\", \"lines\"}` objects")
}

// Generation errors

pub fn gen_no_template(span: Span, name: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Generation,
        "gen::no_template",
        format!("No microcode template for `{name}`"),
    )
    .with_hint("give the instruction template lines in the instruction table")
    .at(span, "instruction without microcode")
}

pub fn gen_dangling_jump(span: Span, addr: u16) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Generation,
        "gen::dangling_jump",
        format!("Jump to address {addr}, which holds no instruction"),
    )
    .with_hint("jumps must target a labelled instruction")
    .at(span, "dangling jump")
}

pub fn gen_bad_template(name: &str, inner: &Diagnostic) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Generation,
        "gen::bad_template",
        format!("Microcode template for `{name}` is invalid: {inner}"),
    )
}

// Micro-assembly errors

pub fn micro_unknown_symbol(span: Span, token: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "micro::unknown_symbol",
        format!("Unknown symbol `{token}` on line {}", span.line()),
    )
    .with_hint("check the enabled signal features")
    .at(span, "unknown symbol")
}

pub fn micro_branch_label(span: Span, expected: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Syntax,
        "micro::branch_label",
        format!("Expected branch body labelled `@{expected}`"),
    )
    .with_hint("the lines after a conditional must start with its branch labels")
    .at(span, "missing branch")
}

pub fn micro_condition(span: Span, message: &str) -> Diagnostic {
    Diagnostic::new(ErrorKind::Syntax, "micro::condition", message.to_string())
        .with_hint("conditionals are written as `IF Z THEN @yes ELSE @no;`")
        .at(span, "malformed conditional")
}

pub fn micro_directive(span: Span, message: &str) -> Diagnostic {
    Diagnostic::new(ErrorKind::Syntax, "micro::directive", message.to_string())
        .with_hint("directives are `.entry`, `.jump` and `.data`")
        .at(span, "malformed directive")
}

pub fn compile_empty() -> Diagnostic {
    Diagnostic::new(ErrorKind::Syntax, "compile::empty", "Nothing to compile")
        .with_hint("the program contains no instructions")
}

// Runtime errors

pub fn run_no_entry(position: usize) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Runtime,
        "run::no_entry",
        format!("No microprogram entry at position {position}"),
    )
    .with_hint("the program ran past its last instruction without `STP`")
}

pub fn run_no_handler(addr: u16) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Runtime,
        "run::no_handler",
        format!("No interrupt handler at address {addr}"),
    )
    .with_hint("place an instruction at every used interrupt vector")
}

pub fn run_bad_snapshot(reason: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Runtime,
        "run::bad_snapshot",
        format!("Inconsistent machine state: {reason}"),
    )
}

pub fn run_bad_memory(addr: u16, size: usize) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Runtime,
        "run::bad_memory",
        format!("Address {addr} lies outside memory of {size} words"),
    )
    .with_hint("increase the address width or move the declaration")
}

pub fn run_bad_interrupt(line: u8, lines: u8) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::Runtime,
        "run::bad_interrupt",
        format!("Interrupt line {line} does not exist"),
    )
    .with_hint(format!("the machine has interrupt lines 0 to {}", lines - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Idx;

    #[test]
    fn location_and_frame() {
        let src = "POB 10\nSOZ ?\n";
        let diag = lex_unknown(Span::new(Idx(11), 1, 2, 5)).with_source(src);
        assert_eq!(
            diag.location(),
            Some(Location {
                line: 2,
                col: 5,
                length: 1
            })
        );
        let frame = diag.render_frame();
        assert!(frame.contains("lex::unknown"));
        assert!(frame.contains("SOZ ?"));
        assert!(frame.contains("unknown character"));
    }

    #[test]
    fn warnings_keep_code() {
        let diag = registry_builtin_override("RST");
        assert_eq!(diag.level(), Level::Warning);
        assert_eq!(diag.code(), "registry::builtin_override");
        assert_eq!(diag.kind(), ErrorKind::Registry);
    }
}
