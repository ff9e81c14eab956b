mod breakpoint;
mod command;
mod console;
mod event;
mod reader;

use std::time::{Duration, Instant};

pub use self::breakpoint::Breakpoints;
pub use self::command::Command;
pub use self::console::{Console, DebuggerOptions};
pub use self::event::{DebugEvent, Observer};
use crate::error::Result;
use crate::runtime::{apply_phase, Step};
use crate::store::Store;

/// Why a debugger operation stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// Did what was asked
    Stepped,
    /// Reached a breakpoint at phase 0 of this address
    Breakpoint(u16),
    Halted,
    /// Ran out of the allowed number of phases
    Limit,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum Status {
    #[default]
    Paused,
    Running,
}

/// Timer state of auto-run.
#[derive(Clone, Copy, Debug)]
struct Auto {
    delay: Duration,
    next_tick: Instant,
}

/// Steps a [`Store`] and records what happened.
pub struct Debugger {
    /// Must not be mutated.
    initial: Store,
    store: Store,

    status: Status,
    breakpoints: Breakpoints,
    /// Used to allow breakpoint to be passed on second attempt.
    current_breakpoint: Option<u16>,

    auto: Option<Auto>,
    /// Auto-run interval kept over a pause, for `resume`
    paused_auto: Option<Duration>,
    /// Upper bound on phases for `run`
    phase_limit: Option<u64>,

    log: Vec<DebugEvent>,
    observers: Vec<Box<dyn Observer>>,
}

impl Debugger {
    pub fn new(store: Store) -> Self {
        Self {
            initial: store.clone(),
            store,
            status: Status::default(),
            breakpoints: Breakpoints::new(),
            current_breakpoint: None,
            auto: None,
            paused_auto: None,
            phase_limit: None,
            log: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_phase_limit(mut self, limit: Option<u64>) -> Self {
        self.phase_limit = limit;
        self
    }

    pub fn phase_limit(&self) -> Option<u64> {
        self.phase_limit
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable access for external inputs (input queue, interrupt requests).
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn log(&self) -> &[DebugEvent] {
        &self.log
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn add_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.insert(addr)
    }

    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(addr)
    }

    fn emit(&mut self, event: DebugEvent) {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
        self.log.push(event);
    }

    /// Address of the breakpoint the machine is sitting on, if any.
    fn breakpoint_here(&self) -> Option<u16> {
        if self.store.phase != 0 || self.store.halted {
            return None;
        }
        let addr = self.store.current_entry()?.addr;
        self.breakpoints.contains(addr).then_some(addr)
    }

    /// Stop at an unacknowledged breakpoint. The second attempt passes it.
    fn check_breakpoint(&mut self) -> Option<u16> {
        let addr = self.breakpoint_here()?;
        if self.current_breakpoint == Some(addr) {
            return None;
        }
        self.current_breakpoint = Some(addr);
        self.emit(DebugEvent::Breakpoint { addr });
        Some(addr)
    }

    /// Phase about to be applied, unless an interrupt takes over first.
    fn upcoming_phase(&self) -> Option<DebugEvent> {
        if self.store.halted
            || (self.store.phase == 0 && self.store.interrupts.next_request().is_some())
        {
            return None;
        }
        let phase = self.store.current_entry()?.phases.get(self.store.phase)?;
        Some(DebugEvent::Phase {
            position: self.store.position,
            phase: self.store.phase,
            signals: phase.to_string(),
        })
    }

    /// Apply one phase, logging it and everything it caused.
    fn step(&mut self) -> Result<Step> {
        if let Some(event) = self.upcoming_phase() {
            self.emit(event);
        }

        let step = apply_phase(&mut self.store)?;
        // Leaving the current entry forgets the acknowledged breakpoint
        if !matches!(step, Step::Phase { retired: false, .. }) {
            self.current_breakpoint = None;
        }

        match step {
            Step::Interrupt { line, handler } => {
                self.emit(DebugEvent::Interrupt { line, handler });
            }
            Step::Phase {
                position,
                retired: true,
                ..
            } => {
                if let Some(entry) = self.store.program.get(position) {
                    let event = DebugEvent::Instruction {
                        position,
                        addr: entry.addr,
                        text: entry.text.clone(),
                    };
                    self.emit(event);
                }
            }
            _ => {}
        }
        for event in self.store.drain_events() {
            self.emit(DebugEvent::Engine(event));
        }
        Ok(step)
    }

    /// Apply a single phase and pause.
    pub fn step_phase(&mut self) -> Result<Outcome> {
        self.status = Status::Paused;
        match self.step()? {
            Step::Halted => Ok(Outcome::Halted),
            _ => Ok(Outcome::Stepped),
        }
    }

    /// Run the current instruction to completion and pause.
    ///
    /// Arriving at phase 0 of a breakpoint stops first. The next call passes it.
    pub fn step_instr(&mut self) -> Result<Outcome> {
        self.status = Status::Paused;
        if let Some(addr) = self.check_breakpoint() {
            return Ok(Outcome::Breakpoint(addr));
        }
        loop {
            match self.step()? {
                Step::Halted => return Ok(Outcome::Halted),
                Step::Phase { retired: true, .. } => return Ok(Outcome::Stepped),
                _ => {}
            }
        }
    }

    /// Run until a breakpoint, a halt or the phase limit.
    pub fn run(&mut self) -> Result<Outcome> {
        self.status = Status::Running;
        let outcome = self.run_inner();
        self.status = Status::Paused;
        outcome
    }

    fn run_inner(&mut self) -> Result<Outcome> {
        let mut count: u64 = 0;
        loop {
            if self.store.halted {
                return Ok(Outcome::Halted);
            }
            if let Some(addr) = self.check_breakpoint() {
                return Ok(Outcome::Breakpoint(addr));
            }
            if self.phase_limit.is_some_and(|limit| count >= limit) {
                return Ok(Outcome::Limit);
            }
            self.step()?;
            count += 1;
        }
    }

    pub fn pause(&mut self) {
        self.status = Status::Paused;
        if let Some(auto) = self.auto.take() {
            self.paused_auto = Some(auto.delay);
        }
    }

    /// Continue after a pause: auto-run picks up its timer again, otherwise run.
    pub fn resume(&mut self) -> Result<Outcome> {
        match self.paused_auto.take() {
            Some(delay) => {
                self.start_auto(delay);
                Ok(Outcome::Stepped)
            }
            None => self.run(),
        }
    }

    /// Restore the machine as it was when the debugger was created.
    pub fn reset(&mut self) {
        self.store = self.initial.clone();
        self.status = Status::Paused;
        self.current_breakpoint = None;
        self.auto = None;
        self.paused_auto = None;
        self.log.clear();
        self.emit(DebugEvent::Reset);
    }

    /// Apply one phase every `delay`, driven by [`Debugger::poll_auto`].
    pub fn start_auto(&mut self, delay: Duration) {
        self.status = Status::Running;
        self.paused_auto = None;
        self.auto = Some(Auto {
            delay,
            next_tick: Instant::now() + delay,
        });
    }

    pub fn stop_auto(&mut self) {
        self.auto = None;
        self.paused_auto = None;
        self.status = Status::Paused;
    }

    pub fn is_auto(&self) -> bool {
        self.auto.is_some()
    }

    /// Perform the tick due at `now`, if any. Returns `None` when nothing was due.
    pub fn poll_auto(&mut self, now: Instant) -> Result<Option<Outcome>> {
        let Some(auto) = self.auto else {
            return Ok(None);
        };
        if now < auto.next_tick {
            return Ok(None);
        }
        if self.store.halted {
            self.stop_auto();
            return Ok(Some(Outcome::Halted));
        }
        if let Some(addr) = self.check_breakpoint() {
            self.stop_auto();
            return Ok(Some(Outcome::Breakpoint(addr)));
        }
        self.auto = Some(Auto {
            next_tick: now + auto.delay,
            ..auto
        });
        let outcome = match self.step()? {
            Step::Halted => Outcome::Halted,
            _ if self.store.halted => Outcome::Halted,
            _ => Outcome::Stepped,
        };
        if outcome == Outcome::Halted {
            self.stop_auto();
        }
        Ok(Some(outcome))
    }

    /// Time until the next auto-run tick.
    pub fn auto_wait(&self, now: Instant) -> Option<Duration> {
        self.auto
            .map(|auto| auto.next_tick.saturating_duration_since(now))
    }
}
