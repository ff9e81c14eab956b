use crate::{
    error::{self, Result},
    microcode::{Meta, Phase},
    signal::{Signal, SignalSet},
    store::{ContextKind, EngineEvent, ReturnContext, Store},
};

/// What a call to [`apply_phase`] did.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    /// Phase `phase` of the entry at `position` was applied
    Phase {
        position: usize,
        phase: usize,
        /// The entry finished with this phase
        retired: bool,
    },
    /// Control moved to the handler of interrupt `line` instead
    Interrupt { line: u8, handler: usize },
    /// The machine is stopped, nothing changed
    Halted,
}

/// Advance the machine by exactly one phase.
pub fn apply_phase(store: &mut Store) -> Result<Step> {
    if store.halted {
        return Ok(Step::Halted);
    }
    if store.phase == 0 {
        if let Some(line) = store.interrupts.next_request() {
            return dispatch(store, line);
        }
    }

    let position = store.position;
    let index = store.phase;
    let Some(entry) = store.program.get(position) else {
        return Err(error::run_no_entry(position));
    };
    let phase = entry.phases.get(index).cloned();
    let (count, operand, addr, meta) = (entry.phases.len(), entry.operand, entry.addr, entry.meta);

    match phase {
        Some(Phase::Signals(set)) => apply_signals(store, set, operand),
        Some(Phase::Branch(branch)) => {
            apply_signals(store, branch.common, operand);
            let taken = if store.flag(branch.flag) {
                &branch.on_true
            } else {
                &branch.on_false
            };
            for set in taken {
                apply_signals(store, *set, operand);
            }
        }
        None => {}
    }

    if store.halted {
        store.phase = 0;
        store.events.push(EngineEvent::Halted { position });
        return Ok(Step::Phase {
            position,
            phase: index,
            retired: true,
        });
    }

    store.phase += 1;
    if store.phase < count {
        return Ok(Step::Phase {
            position,
            phase: index,
            retired: false,
        });
    }

    store.phase = 0;
    store.position = next_position(store, position, addr, meta);
    if let Some(next) = store.program.get(store.position) {
        store.regs.l = next.addr & store.config.addr_mask();
    }
    Ok(Step::Phase {
        position,
        phase: index,
        retired: true,
    })
}

fn dispatch(store: &mut Store, line: u8) -> Result<Step> {
    let vector = store.config.vector_base.wrapping_add(line as u16);
    let Some(handler) = store.position_of(vector) else {
        return Err(error::run_no_handler(vector));
    };
    store.call_stack.push(ReturnContext {
        position: store.position,
        kind: ContextKind::Interrupt,
    });
    store.interrupts.enabled = false;
    store.interrupts.pending &= !(1 << line);
    store.position = handler;
    store.phase = 0;
    store.regs.l = store.mask_addr(vector);
    Ok(Step::Interrupt { line, handler })
}

/// Where control goes once the entry at `position` retires.
fn next_position(store: &mut Store, position: usize, addr: u16, meta: Meta) -> usize {
    if let Some(target) = store.redirect.take() {
        return target;
    }
    let next = match meta {
        Meta::None => position + 1,
        Meta::Jump { target } => target,
        Meta::CondJump {
            flag,
            on_true,
            on_false,
        } => {
            if store.flag(flag) {
                on_true
            } else {
                on_false
            }
        }
    };

    // Falling out of an interrupt handler returns to the interrupted code
    let vector_base = store.config.vector_base;
    let in_handler = addr >= vector_base
        && store
            .call_stack
            .last()
            .is_some_and(|ctx| ctx.kind == ContextKind::Interrupt);
    let leaves = store
        .program
        .get(next)
        .map_or(true, |entry| entry.addr < vector_base);
    if in_handler && leaves {
        if let Some(ctx) = store.call_stack.pop() {
            store.interrupts.enabled = true;
            store.events.push(EngineEvent::InterruptReturn {
                position: ctx.position,
            });
            return ctx.position;
        }
    }
    next
}

/// Apply every signal of `set`, in datapath order.
pub fn apply_signals(store: &mut Store, set: SignalSet, operand: u16) {
    use Signal::*;
    let on = |sig| set.contains(sig);
    let regs = &mut store.regs;

    // Memory
    if on(Czyt) {
        regs.s = store.memory.get(regs.a as usize).copied().unwrap_or(0);
    }
    if on(Pisz) {
        if let Some(cell) = store.memory.get_mut(regs.a as usize) {
            *cell = regs.s;
        }
    }

    // Bus drives
    if on(Wyl) {
        regs.bus_a = regs.l;
    }
    if on(Wyad) {
        regs.bus_a = regs.i & store.config.addr_mask();
    }
    if on(Wys) {
        regs.bus_s = regs.s;
    }
    if on(Wyak) {
        regs.bus_s = regs.ak;
    }
    if on(Wyrb) {
        regs.bus_s = store.input.pop_front().unwrap_or(0) as u16;
    }
    if on(Wyg) {
        regs.bus_s = u16::from(!store.input.is_empty());
    }

    // Pushes
    if on(Push) {
        store.data_stack.push(regs.ak);
    }
    if on(Call) {
        store.call_stack.push(ReturnContext {
            position: store.position + 1,
            kind: ContextKind::Call,
        });
    }

    // Latches
    let word = store.config.word_mask();
    let addr = store.config.addr_mask();
    if on(Wea) {
        regs.a = regs.bus_a & addr;
    }
    if on(Wel) {
        regs.l = regs.bus_a & addr;
    }
    if on(Wes) {
        regs.s = regs.bus_s & word;
    }
    if on(Weja) {
        regs.jaml = regs.bus_s & word;
    }
    if on(Wei) {
        regs.i = operand;
    }
    if on(Il) {
        regs.l = regs.l.wrapping_add(1) & addr;
    }

    // ALU
    let (ak, input) = (regs.ak, regs.jaml);
    let ops: [(Signal, fn(u16, u16) -> u16); 12] = [
        (Przep, |_, b| b),
        (Dod, |a, b| a.wrapping_add(b)),
        (Ode, |a, b| a.wrapping_sub(b)),
        (Mno, |a, b| a.wrapping_mul(b)),
        (Dziel, |a, b| a.checked_div(b).unwrap_or(0)),
        (Shl, |a, _| a << 1),
        (Shr, |a, _| a >> 1),
        (Neg, |a, _| !a),
        (Lub, |a, b| a | b),
        (I, |a, b| a & b),
        (Iak, |a, _| a.wrapping_add(1)),
        (Dak, |a, _| a.wrapping_sub(1)),
    ];
    for (sig, op) in ops {
        if on(sig) {
            regs.alu = op(ak, input) & word;
        }
    }
    if on(Weak) {
        regs.ak = regs.alu & word;
        store.flags.zero = regs.ak == 0;
        store.flags.negative = regs.ak & store.config.sign_bit() != 0;
    }

    // Pops
    if on(Pop) {
        regs.ak = store.data_stack.pop().unwrap_or(0) & word;
    }
    if on(Ret) {
        match store.call_stack.pop() {
            Some(ctx) => {
                if ctx.kind == ContextKind::Interrupt {
                    store.interrupts.enabled = true;
                }
                store.redirect = Some(ctx.position);
            }
            None => store.events.push(EngineEvent::EmptyReturn {
                position: store.position,
            }),
        }
    }

    // Output
    if on(Werb) {
        let byte = regs.bus_s as u8;
        store.output.push(byte);
        store.events.push(EngineEvent::Output(byte));
    }

    // Interrupts
    if on(Eni) {
        store.interrupts.enabled = true;
    }
    if on(Dni) {
        store.interrupts.enabled = false;
    }
    let old = store.interrupts.mask;
    if on(Ustm) {
        store.interrupts.mask |= regs.bus_s as u8;
    }
    if on(Czm) {
        store.interrupts.mask &= !(regs.bus_s as u8);
    }
    if on(Ustm) || on(Czm) {
        store.events.push(EngineEvent::MaskChanged {
            old,
            new: store.interrupts.mask,
        });
    }

    if on(Stop) {
        store.halted = true;
    }
}
