use crate::span::Span;

/// Whole parsed source file.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    pub body: Vec<Node>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Label(LabelDef),
    Instruction(Instruction),
    Directive(Directive),
    Conditional(Conditional),
}

/// `name:`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LabelDef {
    pub name: String,
    pub line: u32,
    pub span: Span,
}

/// `MNEMONIC op1, op2, ...`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    /// Upper-cased mnemonic
    pub name: String,
    pub operands: Vec<Operand>,
    pub line: u32,
    pub span: Span,
}

/// `.NAME op1, ...` or one of the reserved directive mnemonics.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Directive {
    /// Upper-cased, without the leading `.`
    pub name: String,
    pub operands: Vec<Operand>,
    pub line: u32,
    pub span: Span,
}

/// `IF flag THEN branch [ELSE branch]`
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Conditional {
    pub test: String,
    pub test_span: Span,
    pub then_branch: Operand,
    pub else_branch: Option<Operand>,
    pub line: u32,
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Operand {
    pub kind: OperandKind,
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum OperandKind {
    Immediate(i64),
    Register(String),
    LabelRef(String),
}

impl Node {
    pub fn line(&self) -> u32 {
        match self {
            Node::Label(label) => label.line,
            Node::Instruction(instr) => instr.line,
            Node::Directive(dir) => dir.line,
            Node::Conditional(cond) => cond.line,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Label(label) => label.span,
            Node::Instruction(instr) => instr.span,
            Node::Directive(dir) => dir.span,
            Node::Conditional(cond) => cond.span,
        }
    }
}

impl Operand {
    pub fn immediate(&self) -> Option<i64> {
        match self.kind {
            OperandKind::Immediate(val) => Some(val),
            _ => None,
        }
    }
}
