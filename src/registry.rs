use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{self, Diagnostic, Result};
use crate::templates;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// What a table entry declares.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Executable instruction with microcode
    #[default]
    Exec,
    /// Reserves or initialises memory words
    Memory,
    /// Affects assembly only, e.g. the origin
    Directive,
}

/// One row of a caller-supplied instruction table, as read from JSON.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,
    /// Exact operand count, used when no explicit range is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_max: Option<i64>,
    #[serde(default)]
    pub kind: Kind,
    /// Microcode template, one phase per line
    #[serde(default)]
    pub lines: Vec<String>,
}

impl CommandDef {
    pub fn exec(name: &str, args: i64, lines: &[&str]) -> Self {
        CommandDef {
            name: name.to_string(),
            args: Some(args),
            kind: Kind::Exec,
            lines: lines.iter().map(|line| line.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// Normalised instruction definition.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InstructionDef {
    /// Upper-cased mnemonic
    pub name: String,
    pub kind: Kind,
    pub args_min: usize,
    /// `None` means unbounded
    pub args_max: Option<usize>,
    pub lines: Vec<String>,
}

impl InstructionDef {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.args_min && self.args_max.map_or(true, |max| count <= max)
    }

    /// Human form of the arity, e.g. `1`, `0 to 2` or `at least 1`.
    pub fn arity(&self) -> String {
        match self.args_max {
            Some(max) if max == self.args_min => max.to_string(),
            Some(max) => format!("{} to {}", self.args_min, max),
            None => format!("at least {}", self.args_min),
        }
    }
}

/// Names that are always directives, whatever the instruction table says.
pub const BUILTINS: &[&str] = &["RST", "RPA", "ORG", "DATA"];

/// Whether `name` is one of the reserved directive names, in any case.
pub fn is_reserved_directive(name: &str) -> bool {
    BUILTINS.iter().any(|builtin| builtin.eq_ignore_ascii_case(name))
}

fn builtins() -> [InstructionDef; 4] {
    let def = |name: &str, kind, args_min, args_max| InstructionDef {
        name: name.to_string(),
        kind,
        args_min,
        args_max,
        lines: Vec::new(),
    };
    [
        def("RST", Kind::Memory, 1, Some(1)),
        def("RPA", Kind::Memory, 0, Some(0)),
        def("ORG", Kind::Directive, 1, Some(1)),
        def("DATA", Kind::Memory, 1, None),
    ]
}

/// Instruction table merged with the built-in directives.
#[derive(Clone, Debug)]
pub struct Registry {
    defs: FxMap<String, InstructionDef>,
}

impl Registry {
    /// Normalise `commands`. Returns the registry and any warnings produced on the way.
    pub fn build(commands: &[CommandDef]) -> Result<(Registry, Vec<Diagnostic>)> {
        let mut defs = FxMap::with_hasher(FxBuildHasher::default());
        for (index, command) in commands.iter().enumerate() {
            let name = command.name.trim().to_uppercase();
            if name.is_empty() {
                return Err(error::registry_empty_name(index));
            }
            let (args_min, args_max) = normalize_arity(&name, command)?;
            if defs.contains_key(&name) {
                return Err(error::registry_duplicate(&name));
            }
            let def = InstructionDef {
                name: name.clone(),
                kind: command.kind,
                args_min,
                args_max,
                lines: command.lines.clone(),
            };
            defs.insert(name, def);
        }

        let mut warnings = Vec::new();
        for builtin in builtins() {
            if defs.contains_key(&builtin.name) {
                warnings.push(error::registry_builtin_override(&builtin.name));
            }
            defs.insert(builtin.name.clone(), builtin);
        }
        Ok((Registry { defs }, warnings))
    }

    /// Registry of the standard W instruction set.
    pub fn standard() -> Registry {
        match Registry::build(&templates::standard_table()) {
            Ok((registry, _)) => registry,
            Err(err) => unreachable!("standard instruction table is invalid: {err}"),
        }
    }

    /// Look up a mnemonic, in any case.
    pub fn get(&self, name: &str) -> Option<&InstructionDef> {
        self.defs.get(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionDef> {
        self.defs.values()
    }
}

fn normalize_arity(name: &str, command: &CommandDef) -> Result<(usize, Option<usize>)> {
    let min = command.args_min.or(command.args).unwrap_or(0);
    let max = match (command.args_min, command.args_max) {
        (_, Some(max)) => Some(max),
        // A lone minimum leaves the upper bound open
        (Some(_), None) => None,
        (None, None) => Some(min),
    };
    if min < 0 {
        return Err(error::registry_arity(name, "minimum is negative"));
    }
    if let Some(max) = max {
        if max < min {
            return Err(error::registry_arity(
                name,
                &format!("maximum {max} is below minimum {min}"),
            ));
        }
    }
    Ok((min as usize, max.map(|max| max as usize)))
}
