use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::MemoryInit,
    signal::{Flag, SignalSet},
};

/// One clock step of an instruction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Signals(SignalSet),
    Branch(Branch),
}

/// Phase whose effect depends on a flag at the moment it executes.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Branch {
    /// Applied before the taken branch, regardless of the flag
    pub common: SignalSet,
    pub flag: Flag,
    pub on_true: Vec<SignalSet>,
    pub on_false: Vec<SignalSet>,
}

/// Control flow taken once an entry has retired.
///
/// Targets are always pcs of entries in the same program.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Meta {
    #[default]
    None,
    Jump {
        target: usize,
    },
    CondJump {
        flag: Flag,
        on_true: usize,
        on_false: usize,
    },
}

/// Where an entry came from.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Line(u32),
    Label(String),
}

/// Microcode of one machine instruction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MicroprogramEntry {
    /// Dense 0-based index into the microprogram
    pub pc: usize,
    /// Memory address the instruction occupies
    pub addr: u16,
    /// Value latched into the instruction register by `wei`
    pub operand: u16,
    pub origin: Origin,
    /// Readable form of the instruction, e.g. `POB 10`
    pub text: String,
    pub phases: Vec<Phase>,
    pub meta: Meta,
}

impl Phase {
    /// Every signal the phase may assert.
    pub fn signals(&self) -> SignalSet {
        match self {
            Phase::Signals(set) => *set,
            Phase::Branch(branch) => branch
                .on_true
                .iter()
                .chain(&branch.on_false)
                .fold(branch.common, |acc, set| acc.union(*set)),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Signals(set) => write!(f, "{}", set),
            Phase::Branch(branch) => {
                if !branch.common.is_empty() {
                    write!(f, "{} ", branch.common)?;
                }
                write!(f, "IF {} THEN ", branch.flag)?;
                write_sets(f, &branch.on_true)?;
                write!(f, " ELSE ")?;
                write_sets(f, &branch.on_false)
            }
        }
    }
}

fn write_sets(f: &mut fmt::Formatter<'_>, sets: &[SignalSet]) -> fmt::Result {
    write!(f, "[")?;
    for (i, set) in sets.iter().enumerate() {
        if i > 0 {
            write!(f, "; ")?;
        }
        write!(f, "{}", set)?;
    }
    write!(f, "]")
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meta::None => Ok(()),
            Meta::Jump { target } => write!(f, "jump {}", target),
            Meta::CondJump {
                flag,
                on_true,
                on_false,
            } => write!(f, "if {} jump {} else {}", flag, on_true, on_false),
        }
    }
}

/// Render a microprogram as micro-assembly text, one phase per line.
///
/// Every entry is introduced by `.entry` with its address and operand, followed by `.jump` when it
/// redirects control, and `memory` is written as `.data` runs. Branch bodies are written as
/// labelled lines directly after their conditional line. The output compiles back to the same
/// program.
pub fn render(program: &[MicroprogramEntry], memory: &[MemoryInit]) -> String {
    let mut out = String::new();
    // Writing to a `String` cannot fail
    for run in data_runs(memory) {
        let values = run.iter().map(|init| init.value.to_string()).collect::<Vec<_>>();
        let _ = writeln!(out, ".data {} {}", run[0].address, values.join(" "));
    }
    let addr_of = |pc: usize| program.get(pc).map(|entry| entry.addr);
    for entry in program {
        let _ = writeln!(out, "// {}: {}", entry.pc, entry.text);
        let _ = writeln!(out, ".entry {} {}", entry.addr, entry.operand);
        match entry.meta {
            Meta::None => {}
            Meta::Jump { target } => {
                if let Some(addr) = addr_of(target) {
                    let _ = writeln!(out, ".jump {}", addr);
                }
            }
            Meta::CondJump {
                flag,
                on_true,
                on_false,
            } => match (addr_of(on_true), addr_of(on_false)) {
                (Some(yes), _) if on_false == entry.pc + 1 => {
                    let _ = writeln!(out, ".jump {} {}", flag, yes);
                }
                (Some(yes), Some(no)) => {
                    let _ = writeln!(out, ".jump {} {} {}", flag, yes, no);
                }
                _ => {}
            },
        }
        for (i, phase) in entry.phases.iter().enumerate() {
            match phase {
                Phase::Signals(set) => {
                    let _ = writeln!(out, "{};", set);
                }
                Phase::Branch(branch) => {
                    let yes = format!("p{}_{}_t", entry.pc, i);
                    let no = format!("p{}_{}_f", entry.pc, i);
                    if !branch.common.is_empty() {
                        let _ = write!(out, "{} ", branch.common);
                    }
                    if branch.on_false.is_empty() {
                        let _ = writeln!(out, "IF {} THEN @{};", branch.flag, yes);
                        let _ = writeln!(out, "{};", labelled(&yes, &branch.on_true));
                    } else {
                        let _ = writeln!(out, "IF {} THEN @{} ELSE @{};", branch.flag, yes, no);
                        let _ = writeln!(out, "{};", labelled(&yes, &branch.on_true));
                        let _ = writeln!(out, "{};", labelled(&no, &branch.on_false));
                    }
                }
            }
        }
    }
    out
}

/// Memory words grouped into runs of consecutive addresses.
fn data_runs(memory: &[MemoryInit]) -> Vec<Vec<MemoryInit>> {
    let mut sorted = memory.to_vec();
    sorted.sort_by_key(|init| init.address);
    let mut runs: Vec<Vec<MemoryInit>> = Vec::new();
    for init in sorted {
        match runs.last_mut() {
            Some(run) if follows(run, init) => run.push(init),
            _ => runs.push(vec![init]),
        }
    }
    runs
}

fn follows(run: &[MemoryInit], init: MemoryInit) -> bool {
    run.last()
        .is_some_and(|last| last.address.checked_add(1) == Some(init.address))
}

fn labelled(label: &str, sets: &[SignalSet]) -> String {
    let body = sets
        .iter()
        .fold(SignalSet::empty(), |acc, set| acc.union(*set));
    if body.is_empty() {
        format!("@{}", label)
    } else {
        format!("@{} {}", label, body)
    }
}
