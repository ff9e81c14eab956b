use std::fmt;

use crate::store::EngineEvent;

/// Record of something the debugger did, in the order it happened.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DebugEvent {
    /// About to apply a phase
    Phase {
        position: usize,
        phase: usize,
        /// Rendered phase signals
        signals: String,
    },
    /// An entry retired
    Instruction {
        position: usize,
        addr: u16,
        text: String,
    },
    Interrupt {
        line: u8,
        handler: usize,
    },
    Breakpoint {
        addr: u16,
    },
    Reset,
    Engine(EngineEvent),
}

/// Receives every event as it is logged.
pub trait Observer {
    fn notify(&mut self, event: &DebugEvent);
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugEvent::Phase {
                position,
                phase,
                signals,
            } => write!(f, "phase    {}.{}: {}", position, phase, signals),
            DebugEvent::Instruction {
                position,
                addr,
                text,
            } => write!(f, "instr    {} @ 0x{:04x}: {}", position, addr, text),
            DebugEvent::Interrupt { line, handler } => {
                write!(f, "irq      line {} -> {}", line, handler)
            }
            DebugEvent::Breakpoint { addr } => write!(f, "break    0x{:04x}", addr),
            DebugEvent::Reset => write!(f, "reset"),
            DebugEvent::Engine(event) => match event {
                EngineEvent::MaskChanged { old, new } => {
                    write!(f, "mask     {:08b} -> {:08b}", old, new)
                }
                EngineEvent::Output(byte) => write!(f, "output   0x{:02x}", byte),
                EngineEvent::EmptyReturn { position } => {
                    write!(f, "return   {}: call stack is empty", position)
                }
                EngineEvent::InterruptReturn { position } => {
                    write!(f, "iret     -> {}", position)
                }
                EngineEvent::Halted { position } => write!(f, "halt     {}", position),
            },
        }
    }
}
