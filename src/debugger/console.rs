use std::thread::sleep;
use std::time::{Duration, Instant};

use super::command::{Command, Location};
use super::reader::{SourceMode, SourceReader as _};
use super::{DebugEvent, Debugger, Outcome};
use crate::error::Result;
use crate::output::{Condition, Output};
use crate::store::EngineEvent;
use crate::symbol::SymbolTable;

/// Leave this as a struct, in case more options are added in the future.
#[derive(Debug, Default)]
pub struct DebuggerOptions {
    /// Commands to run instead of reading stdin
    pub command: Option<String>,
    /// Upper bound on phases applied by one `run` or `auto`
    pub phase_limit: Option<u64>,
}

/// Text command session around a [`Debugger`].
pub struct Console {
    debugger: Debugger,
    source: SourceMode,
    symbols: SymbolTable,
    /// Log records already shown
    printed: usize,
}

impl Console {
    pub fn new(debugger: Debugger, symbols: SymbolTable, opts: DebuggerOptions) -> Self {
        Self {
            debugger: debugger.with_phase_limit(opts.phase_limit),
            source: SourceMode::from(opts.command),
            symbols,
            printed: 0,
        }
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    /// Read and execute commands until `quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        dprintln!(Sometimes, "Debugger ready. Type `help` for a list of commands.");
        while let Some(command) = self.next_command() {
            if command == Command::Quit {
                break;
            }
            self.execute(command)?;
            self.flush_output();
            self.print_new_events();
        }
        dprintln!(Sometimes, "Leaving debugger.");
        Ok(())
    }

    /// Returns `None` on EOF.
    fn next_command(&mut self) -> Option<Command> {
        // Loop until valid command or EOF
        loop {
            let line = self.source.read()?.trim();
            // Necessary, since `Command::try_from` assumes non-empty line
            if line.is_empty() {
                continue;
            }
            match Command::try_from(line) {
                Ok(command) => return Some(command),
                Err(error) => {
                    dprintln!(Always, "{}", error);
                }
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Quit => {}

            Command::Help => {
                dprintln!(Always, "\n{}", include_str!("./help.txt"));
            }

            Command::Step { count } => {
                for _ in 0..count {
                    let outcome = self.debugger.step_phase()?;
                    if outcome != Outcome::Stepped {
                        self.report(outcome);
                        break;
                    }
                }
            }
            Command::Next { count } => {
                for _ in 0..count {
                    let outcome = self.debugger.step_instr()?;
                    if outcome != Outcome::Stepped {
                        self.report(outcome);
                        break;
                    }
                }
            }
            Command::Run => {
                dprintln!(Sometimes, "Running...");
                let outcome = self.debugger.run()?;
                self.report(outcome);
            }
            Command::Continue => {
                dprintln!(Sometimes, "Continuing...");
                let outcome = self.debugger.resume()?;
                self.drive_auto()?;
                self.report(outcome);
            }
            Command::Auto { delay_ms: None } => {
                self.debugger.stop_auto();
                dprintln!(Always, "Stopped auto-run.");
            }
            Command::Auto {
                delay_ms: Some(delay),
            } => {
                dprintln!(Always, "Auto-running every {} ms.", delay);
                self.debugger.start_auto(Duration::from_millis(delay));
                self.drive_auto()?;
            }

            Command::BreakAdd { location } => {
                let Some(addr) = self.resolve(&location) else {
                    return Ok(());
                };
                if self.debugger.add_breakpoint(addr) {
                    dprintln!(Always, "Added breakpoint at 0x{:04x}.", addr);
                } else {
                    dprintln!(Always, "Breakpoint already exists at 0x{:04x}.", addr);
                }
            }
            Command::BreakRemove { location } => {
                let Some(addr) = self.resolve(&location) else {
                    return Ok(());
                };
                if self.debugger.remove_breakpoint(addr) {
                    dprintln!(Always, "Removed breakpoint at 0x{:04x}.", addr);
                } else {
                    dprintln!(Always, "No breakpoint exists at 0x{:04x}.", addr);
                }
            }
            Command::BreakList => self.print_breakpoints(),

            Command::Registers => {
                dprintln!(Sometimes, "Registers:");
                Output::Debugger(Condition::Always).print_registers(self.debugger.store());
            }
            Command::Memory { location, count } => {
                let Some(addr) = self.resolve(&location) else {
                    return Ok(());
                };
                self.print_memory(addr, count);
            }

            Command::Input { text } => {
                self.debugger.store_mut().push_input(text.as_bytes());
                dprintln!(Always, "Queued {} input byte(s).", text.len());
            }
            Command::Interrupt { line } => match self.debugger.store_mut().request_interrupt(line) {
                Ok(()) => dprintln!(Always, "Requested interrupt on line {}.", line),
                Err(error) => dprintln!(Always, "{}", error),
            },

            Command::Reset => {
                self.debugger.reset();
                self.printed = 0;
                dprintln!(Always, "Reset machine to initial state.");
            }
            Command::Log => {
                for event in self.debugger.log() {
                    dprintln!(Always, "{}", event);
                }
                self.printed = self.debugger.log().len();
            }
        }
        Ok(())
    }

    /// Tick auto-run until it stops itself or reaches the phase limit.
    fn drive_auto(&mut self) -> Result<()> {
        let mut ticks: u64 = 0;
        while self.debugger.is_auto() {
            if self
                .debugger
                .phase_limit()
                .is_some_and(|limit| ticks >= limit)
            {
                self.debugger.pause();
                self.report(Outcome::Limit);
                break;
            }
            if let Some(wait) = self.debugger.auto_wait(Instant::now()) {
                sleep(wait);
            }
            match self.debugger.poll_auto(Instant::now())? {
                Some(Outcome::Stepped) => ticks += 1,
                Some(outcome) => self.report(outcome),
                None => {}
            }
            self.flush_output();
            self.print_new_events();
        }
        Ok(())
    }

    fn report(&self, outcome: Outcome) {
        match outcome {
            Outcome::Stepped => {}
            Outcome::Breakpoint(addr) => {
                dprintln!(Always, "Reached breakpoint at 0x{:04x}. Pausing execution.", addr);
            }
            Outcome::Halted => dprintln!(Always, "Machine halted."),
            Outcome::Limit => dprintln!(Always, "Reached phase limit. Pausing execution."),
        }
    }

    fn resolve(&self, location: &Location) -> Option<u16> {
        match location {
            Location::Address(addr) => Some(*addr),
            Location::Label(name) => {
                let found = self.symbols.get(name).or_else(|| {
                    self.symbols
                        .iter()
                        .find(|(label, _)| label.eq_ignore_ascii_case(name))
                        .map(|(_, addr)| addr)
                });
                if found.is_none() {
                    dprintln!(Always, "Label not found named `{}`.", name);
                }
                found
            }
        }
    }

    fn print_breakpoints(&self) {
        let breakpoints = self.debugger.breakpoints();
        if breakpoints.is_empty() {
            dprintln!(Always, "No breakpoints exist.");
            return;
        }
        dprintln!(Always, "Breakpoints:");
        for (i, addr) in breakpoints.iter().enumerate() {
            if Output::is_minimal() {
                dprintln!(Always, "0x{:04x}", addr);
                continue;
            }
            let branch = if i + 1 == breakpoints.len() {
                "╰─"
            } else {
                "├─"
            };
            dprint!(Always, "{} 0x{:04x}", branch, addr);
            if let Some(name) = self.symbols.name_of(addr) {
                dprint!(Always, "  ──  {}", name);
            }
            dprintln!(Always);
        }
    }

    fn print_memory(&self, addr: u16, count: u16) {
        let store = self.debugger.store();
        let sign_bit = store.config.sign_bit();
        for offset in 0..count.max(1) {
            let Some(at) = addr.checked_add(offset) else {
                break;
            };
            let Some(value) = store.mem(at) else {
                dprintln!(Always, "Address 0x{:04x} lies outside memory.", at);
                break;
            };
            dprint!(Always, "0x{:04x}  ", at);
            Output::Debugger(Condition::Always).print_integer(value, sign_bit);
            dprintln!(Always);
        }
    }

    /// Program output goes to stdout as it is produced.
    fn flush_output(&mut self) {
        let bytes = self.debugger.store_mut().take_output();
        if !bytes.is_empty() {
            Output::Normal.print_str(&String::from_utf8_lossy(&bytes));
        }
    }

    fn print_new_events(&mut self) {
        let log = self.debugger.log();
        for event in log.iter().skip(self.printed) {
            match event {
                // Reported by `report`
                DebugEvent::Breakpoint { .. } | DebugEvent::Engine(EngineEvent::Halted { .. }) => {}
                DebugEvent::Engine(EngineEvent::Output(_)) => {}
                DebugEvent::Engine(_) | DebugEvent::Interrupt { .. } | DebugEvent::Reset => {
                    dprintln!(Always, "{}", event);
                }
                DebugEvent::Phase { .. } | DebugEvent::Instruction { .. } => {
                    dprintln!(Sometimes, "{}", event);
                }
            }
        }
        self.printed = log.len();
    }
}
