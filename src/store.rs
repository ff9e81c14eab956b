use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::MemoryInit,
    config::MachineConfig,
    error::{self, Result},
    microcode::{Meta, MicroprogramEntry},
    signal::Flag,
};

/// Number of interrupt request lines.
pub const INTERRUPT_LINES: u8 = 8;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Registers {
    /// Instruction register, holds the operand of the current instruction
    pub i: u16,
    /// Line counter
    pub l: u16,
    /// Address register
    pub a: u16,
    /// Data register
    pub s: u16,
    /// Accumulator
    pub ak: u16,
    /// ALU result latch
    pub alu: u16,
    /// ALU input latch
    pub jaml: u16,
    pub bus_a: u16,
    pub bus_s: u16,
}

/// Condition flags derived from the accumulator on every commit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Flags {
    pub zero: bool,
    pub negative: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Call,
    Interrupt,
}

/// Where execution continues after a return.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReturnContext {
    pub position: usize,
    pub kind: ContextKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Interrupts {
    pub enabled: bool,
    /// Bit `n` set when line `n` has requested service
    pub pending: u8,
    /// Bit `n` set when line `n` is masked
    pub mask: u8,
}

impl Interrupts {
    /// Lowest unmasked pending line, if interrupts are enabled.
    pub fn next_request(&self) -> Option<u8> {
        if !self.enabled {
            return None;
        }
        let ready = self.pending & !self.mask;
        (ready != 0).then(|| ready.trailing_zeros() as u8)
    }
}

/// Side effects of a phase worth reporting.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EngineEvent {
    MaskChanged { old: u8, new: u8 },
    Output(u8),
    /// `ret` with nothing to return to
    EmptyReturn { position: usize },
    InterruptReturn { position: usize },
    Halted { position: usize },
}

/// Complete machine state.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Store {
    pub config: MachineConfig,
    pub regs: Registers,
    pub flags: Flags,
    pub memory: Vec<u16>,
    pub data_stack: Vec<u16>,
    pub call_stack: Vec<ReturnContext>,
    pub program: Vec<MicroprogramEntry>,
    /// Index of the current entry
    pub position: usize,
    /// Index of the next phase within the current entry
    pub phase: usize,
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub interrupts: Interrupts,
    pub halted: bool,
    /// Position requested by `ret`, taken when the current entry retires
    pub(crate) redirect: Option<usize>,
    #[serde(skip)]
    pub(crate) events: Vec<EngineEvent>,
}

/// Serialised form of a [`Store`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub store: Store,
}

impl Store {
    /// Fresh machine with `program` loaded and memory seeded from `memory`.
    pub fn new(
        config: MachineConfig,
        program: Vec<MicroprogramEntry>,
        memory: &[MemoryInit],
    ) -> Result<Store> {
        let mut cells = vec![0; config.memory_size()];
        for init in memory {
            let Some(cell) = cells.get_mut(init.address as usize) else {
                return Err(error::run_bad_memory(init.address, config.memory_size()));
            };
            *cell = init.value & config.word_mask();
        }

        let start = program.first().map_or(0, |entry| entry.addr) & config.addr_mask();
        Ok(Store {
            config,
            regs: Registers {
                l: start,
                a: start,
                ..Default::default()
            },
            flags: Flags {
                zero: true,
                negative: false,
            },
            memory: cells,
            data_stack: Vec::new(),
            call_stack: Vec::new(),
            program,
            position: 0,
            phase: 0,
            input: VecDeque::new(),
            output: Vec::new(),
            interrupts: Interrupts::default(),
            halted: false,
            redirect: None,
            events: Vec::new(),
        })
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Zero => self.flags.zero,
            Flag::Negative => self.flags.negative,
            Flag::Ready => self.ready(),
        }
    }

    /// Whether input is waiting to be read.
    pub fn ready(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn mem(&self, addr: u16) -> Option<u16> {
        self.memory.get(addr as usize).copied()
    }

    pub fn current_entry(&self) -> Option<&MicroprogramEntry> {
        self.program.get(self.position)
    }

    /// Position of the entry occupying `addr`.
    pub fn position_of(&self, addr: u16) -> Option<usize> {
        self.program.iter().position(|entry| entry.addr == addr)
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn request_interrupt(&mut self, line: u8) -> Result<()> {
        if line >= INTERRUPT_LINES {
            return Err(error::run_bad_interrupt(line, INTERRUPT_LINES));
        }
        self.interrupts.pending |= 1 << line;
        Ok(())
    }

    /// Events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn mask_addr(&self, value: u16) -> u16 {
        value & self.config.addr_mask()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            store: self.clone(),
        }
    }

    /// Rebuild a store from a snapshot, rejecting inconsistent state.
    pub fn restore(snapshot: Snapshot) -> Result<Store> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(error::run_bad_snapshot(&format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        let store = snapshot.store;
        store.check().map_err(|reason| error::run_bad_snapshot(&reason))?;
        Ok(store)
    }

    fn check(&self) -> std::result::Result<(), String> {
        let config = &self.config;
        config.validate()?;
        if self.memory.len() != config.memory_size() {
            return Err(format!(
                "memory holds {} words, expected {}",
                self.memory.len(),
                config.memory_size()
            ));
        }
        let word = config.word_mask();
        if let Some(addr) = self.memory.iter().position(|cell| cell & !word != 0) {
            return Err(format!("memory word at {} exceeds the word width", addr));
        }
        if self.data_stack.iter().any(|value| value & !word != 0) {
            return Err("data stack entry exceeds the word width".to_string());
        }
        let regs = &self.regs;
        for (name, value) in [
            ("S", regs.s),
            ("AK", regs.ak),
            ("ALU", regs.alu),
            ("JAML", regs.jaml),
            ("bus S", regs.bus_s),
        ] {
            if value & !word != 0 {
                return Err(format!("register {} exceeds the word width", name));
            }
        }
        let addr = config.addr_mask();
        for (name, value) in [("A", regs.a), ("L", regs.l), ("bus A", regs.bus_a)] {
            if value & !addr != 0 {
                return Err(format!("register {} exceeds the address width", name));
            }
        }

        let len = self.program.len();
        for (pc, entry) in self.program.iter().enumerate() {
            if entry.pc != pc {
                return Err(format!("entry {} is stored at position {}", entry.pc, pc));
            }
            let targets = match entry.meta {
                Meta::None => vec![],
                Meta::Jump { target } => vec![target],
                Meta::CondJump {
                    on_true, on_false, ..
                } => vec![on_true, on_false],
            };
            if targets.iter().any(|target| *target > len) {
                return Err(format!("entry {} jumps outside the program", pc));
            }
        }
        if self.position > len {
            return Err(format!("position {} lies outside the program", self.position));
        }
        let phases = self.current_entry().map_or(0, |entry| entry.phases.len());
        if self.phase > 0 && self.phase >= phases {
            return Err(format!(
                "phase {} lies outside entry {}",
                self.phase, self.position
            ));
        }
        if self.redirect.is_some_and(|target| target > len)
            || self.call_stack.iter().any(|ctx| ctx.position > len)
        {
            return Err("return context lies outside the program".to_string());
        }
        Ok(())
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| error::run_bad_snapshot(&err.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Snapshot> {
        serde_json::from_str(json).map_err(|err| error::run_bad_snapshot(&err.to_string()))
    }
}
