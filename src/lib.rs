// Parsing
mod ast;
mod lexer;
mod parser;
mod span;
mod token;
pub use lexer::tokenize;
pub use parser::{parse, AsmParser};

// Analysis and generation
mod analyzer;
mod generator;
mod registry;
mod symbol;
mod templates;
pub use analyzer::{analyze, MemoryInit, Resolved};
pub use generator::generate;
pub use registry::{CommandDef, InstructionDef, Kind, Registry};
pub use symbol::SymbolTable;
pub use templates::TemplateLibrary;

// Microcode
mod micro;
mod microcode;
mod signal;
pub use micro::{compile, LowLevelProgram, MicroConfig};
pub use microcode::{render, Meta, MicroprogramEntry, Phase};
pub use signal::{Flag, Signal, SignalSet};

// Running
mod config;
mod features;
mod runtime;
mod store;
pub use config::MachineConfig;
pub use features::Features;
pub use runtime::{apply_phase, Step};
pub use store::{EngineEvent, Snapshot, Store};
#[macro_use]
pub mod output;
pub mod debugger;

mod toolchain;
pub use toolchain::{Compiled, Toolchain};

pub mod error;
pub use error::Diagnostic;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
