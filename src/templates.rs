use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::{
    error::{self, Result},
    micro::parse_phases,
    microcode::Phase,
    registry::{CommandDef, InstructionDef},
    signal::{Flag, SignalSet},
};

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Every instruction starts by fetching its word and advancing `L`.
pub const FETCH: &str = "czyt wei il";

/// Operand read shared by the memory-operand ALU instructions.
macro_rules! memory_op {
    ( $op:literal ) => {
        &[FETCH, "wyad wea", concat!("czyt wys weja ", $op, " weak wyl wea")]
    };
}

/// Built-in W instruction set: mnemonic, operand count, phases.
const STANDARD: &[(&str, i64, &[&str])] = &[
    ("POB", 1, memory_op!("przep")),
    ("LAD", 1, &[FETCH, "wyad wea wyak wes", "pisz wyl wea"]),
    ("DOD", 1, memory_op!("dod")),
    ("ODE", 1, memory_op!("ode")),
    ("SOB", 1, &[FETCH, "wyad wel wea"]),
    (
        "SOM",
        1,
        &[FETCH, "IF N THEN @skok ELSE @dalej", "@skok wyad wel wea", "@dalej wyl wea"],
    ),
    (
        "SOZ",
        1,
        &[FETCH, "IF Z THEN @skok ELSE @dalej", "@skok wyad wel wea", "@dalej wyl wea"],
    ),
    ("STP", 0, &[FETCH, "stop"]),
    // Extended ALU
    ("MNO", 1, memory_op!("mno")),
    ("DZI", 1, memory_op!("dziel")),
    ("LUB", 1, memory_op!("lub")),
    ("ILO", 1, memory_op!("i")),
    ("SHL", 0, &[FETCH, "shl weak wyl wea"]),
    ("SHR", 0, &[FETCH, "shr weak wyl wea"]),
    ("NEG", 0, &[FETCH, "neg weak wyl wea"]),
    ("INK", 0, &[FETCH, "iak weak wyl wea"]),
    ("DEK", 0, &[FETCH, "dak weak wyl wea"]),
    // Stack
    ("SDP", 1, &[FETCH, "call wyad wel wea"]),
    ("PWR", 0, &[FETCH, "ret"]),
    ("WST", 0, &[FETCH, "push wyl wea"]),
    ("PZS", 0, &[FETCH, "pop wyl wea"]),
    // Input/output
    ("WPR", 0, &[FETCH, "wyrb weja przep weak wyl wea"]),
    ("WYP", 0, &[FETCH, "wyak werb wyl wea"]),
    // Interrupts
    ("ZEZ", 0, &[FETCH, "eni wyl wea"]),
    ("DNS", 0, &[FETCH, "dni wyl wea"]),
    ("MSK", 1, &[FETCH, "wyad wea", "czyt wys ustm wyl wea"]),
    ("CZM", 1, &[FETCH, "wyad wea", "czyt wys czm wyl wea"]),
];

/// How an instruction redirects control once it retires.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpKind {
    Always,
    /// Jump when the flag holds, fall through otherwise
    When(Flag),
}

/// Control flow of a mnemonic, `None` for straight-line instructions.
pub fn jump_kind(name: &str) -> Option<JumpKind> {
    match name.to_uppercase().as_str() {
        "SOB" | "SDP" => Some(JumpKind::Always),
        "SOM" => Some(JumpKind::When(Flag::Negative)),
        "SOZ" => Some(JumpKind::When(Flag::Zero)),
        _ => None,
    }
}

/// Instruction table of the W machine, without microcode.
///
/// The microcode is kept in [`TemplateLibrary::standard`], so a caller-supplied table may reuse
/// these mnemonics while only listing their arity.
pub fn standard_table() -> Vec<CommandDef> {
    STANDARD
        .iter()
        .map(|(name, args, _)| CommandDef::exec(name, *args, &[]))
        .collect()
}

/// Canonical phase templates by mnemonic.
#[derive(Clone, Debug)]
pub struct TemplateLibrary {
    templates: FxMap<String, Vec<String>>,
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        TemplateLibrary {
            templates: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn standard() -> Self {
        let mut library = TemplateLibrary::empty();
        for (name, _, lines) in STANDARD {
            library.insert(name, lines.iter().map(|line| line.to_string()).collect());
        }
        library
    }

    /// Add or replace the template of `name`.
    pub fn insert(&mut self, name: &str, lines: Vec<String>) {
        self.templates.insert(name.to_uppercase(), lines);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.templates
            .get(&name.to_uppercase())
            .map(|lines| lines.as_slice())
    }

    /// Template lines for `def`: its own lines when it has any, else the library's.
    pub fn lines_for<'a>(&'a self, def: &'a InstructionDef) -> Option<&'a [String]> {
        if !def.lines.is_empty() {
            return Some(&def.lines);
        }
        self.get(&def.name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|name| name.as_str())
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        TemplateLibrary::standard()
    }
}

/// Turn template lines into phases, allowing only `available` signals.
pub fn expand(name: &str, lines: &[String], available: SignalSet) -> Result<Vec<Phase>> {
    let parsed = parse_phases(&lines.join("\n"), available)
        .map_err(|err| error::gen_bad_template(name, &err))?;
    Ok(parsed.into_iter().map(|parsed| parsed.phase).collect())
}
