use fxhash::FxHashMap;

use crate::{
    analyzer::{layout, Resolved},
    ast::{Conditional, Instruction, Node, Operand, OperandKind},
    error::{self, Result},
    micro::fetch_phase,
    microcode::{Branch, Meta, MicroprogramEntry, Origin, Phase},
    registry::Registry,
    signal::{Flag, Signal, SignalSet},
    span::Span,
    templates::{self, jump_kind, JumpKind, TemplateLibrary},
};

/// Expand a resolved program into microcode, one entry per instruction or conditional.
pub fn generate(
    resolved: &Resolved,
    registry: &Registry,
    library: &TemplateLibrary,
    available: SignalSet,
) -> Result<Vec<MicroprogramEntry>> {
    let addresses = layout(&resolved.body, registry)?;

    // Pass 1: dense pc for every executable node
    let mut pcs = FxHashMap::default();
    let mut executable = Vec::new();
    for (node, addr) in resolved.body.iter().zip(addresses) {
        if matches!(node, Node::Instruction(_) | Node::Conditional(_)) {
            pcs.insert(addr, executable.len());
            executable.push((node, addr));
        }
    }
    if executable.is_empty() {
        return Err(error::compile_empty());
    }

    // Pass 2: expansion
    let gen = Generator {
        registry,
        library,
        available,
        pcs: &pcs,
        len: executable.len(),
    };
    executable
        .into_iter()
        .enumerate()
        .map(|(pc, (node, addr))| match node {
            Node::Instruction(instr) => gen.instruction(pc, addr, instr),
            Node::Conditional(cond) => gen.conditional(pc, addr, cond),
            _ => unreachable!("only executable nodes are collected"),
        })
        .collect()
}

struct Generator<'a> {
    registry: &'a Registry,
    library: &'a TemplateLibrary,
    available: SignalSet,
    /// Address -> pc
    pcs: &'a FxHashMap<u16, usize>,
    /// Number of entries
    len: usize,
}

impl Generator<'_> {
    fn instruction(&self, pc: usize, addr: u16, instr: &Instruction) -> Result<MicroprogramEntry> {
        let lines = self
            .registry
            .get(&instr.name)
            .and_then(|def| self.library.lines_for(def))
            .ok_or_else(|| error::gen_no_template(instr.span, &instr.name))?;
        let phases = templates::expand(&instr.name, lines, self.available)?;
        let immediate = first_immediate(&instr.operands);
        let operand = immediate.unwrap_or(0);

        let meta = match jump_kind(&instr.name) {
            None => Meta::None,
            Some(kind) => {
                let Some(addr) = immediate else {
                    return Err(error::sema_operand_shape(
                        instr.span,
                        &format!("`{}` without a target address", instr.name),
                    ));
                };
                let target = self.target(instr.span, addr)?;
                match kind {
                    JumpKind::Always => Meta::Jump { target },
                    JumpKind::When(flag) => Meta::CondJump {
                        flag,
                        on_true: target,
                        on_false: self.fall_through(instr.span, pc, addr)?,
                    },
                }
            }
        };

        Ok(MicroprogramEntry {
            pc,
            addr,
            operand,
            origin: Origin::Line(instr.line),
            text: instruction_text(instr),
            phases,
            meta,
        })
    }

    fn conditional(&self, pc: usize, addr: u16, cond: &Conditional) -> Result<MicroprogramEntry> {
        let flag = Flag::parse(&cond.test)
            .ok_or_else(|| error::sema_unknown_flag(cond.test_span, &cond.test))?;
        let then_addr = cond.then_branch.immediate().unwrap_or(0) as u16;
        let on_true = self.target(cond.then_branch.span, then_addr)?;
        let on_false = match &cond.else_branch {
            Some(operand) => self.target(operand.span, operand.immediate().unwrap_or(0) as u16)?,
            None => self.fall_through(cond.span, pc, addr)?,
        };

        let phases = vec![
            Phase::Signals(fetch_phase()),
            Phase::Branch(Branch {
                common: SignalSet::empty(),
                flag,
                on_true: vec![SignalSet::of(&[Signal::Wyad, Signal::Wel, Signal::Wea])],
                on_false: vec![SignalSet::of(&[Signal::Wyl, Signal::Wea])],
            }),
        ];

        let mut text = format!("IF {} THEN {}", flag, then_addr);
        if let Some(operand) = &cond.else_branch {
            text.push_str(&format!(" ELSE {}", operand.immediate().unwrap_or(0)));
        }

        Ok(MicroprogramEntry {
            pc,
            addr,
            operand: then_addr,
            origin: Origin::Line(cond.line),
            text,
            phases,
            meta: Meta::CondJump {
                flag,
                on_true,
                on_false,
            },
        })
    }

    /// Entry after `pc`, taken when a conditional jump is not.
    fn fall_through(&self, span: Span, pc: usize, addr: u16) -> Result<usize> {
        if pc + 1 < self.len {
            Ok(pc + 1)
        } else {
            Err(error::gen_dangling_jump(span, addr.wrapping_add(1)))
        }
    }

    fn target(&self, span: Span, addr: u16) -> Result<usize> {
        self.pcs
            .get(&addr)
            .copied()
            .ok_or_else(|| error::gen_dangling_jump(span, addr))
    }
}

fn first_immediate(operands: &[Operand]) -> Option<u16> {
    operands
        .iter()
        .find_map(Operand::immediate)
        .map(|value| value as u16)
}

fn instruction_text(instr: &Instruction) -> String {
    let operands = instr
        .operands
        .iter()
        .map(|operand| match &operand.kind {
            OperandKind::Immediate(value) => value.to_string(),
            OperandKind::Register(name) | OperandKind::LabelRef(name) => name.clone(),
        })
        .collect::<Vec<_>>();
    if operands.is_empty() {
        instr.name.clone()
    } else {
        format!("{} {}", instr.name, operands.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::features::Features;
    use crate::parser::parse;
    use crate::registry::CommandDef;

    fn gen_with(src: &str, features: Features) -> Result<Vec<MicroprogramEntry>> {
        let registry = Registry::standard();
        let resolved = analyze(parse(src).unwrap(), &registry).unwrap();
        generate(
            &resolved,
            &registry,
            &TemplateLibrary::standard(),
            SignalSet::available(&features),
        )
    }

    fn gen(src: &str) -> Result<Vec<MicroprogramEntry>> {
        gen_with(src, Features::default())
    }

    #[test]
    fn three_entries_for_small_program() {
        let program = gen("start: POB 10\nSOZ start\nend: STP\nORG 10\nx: RST 3").unwrap();
        assert_eq!(program.len(), 3);
        assert_eq!(program[0].text, "POB 10");
        assert_eq!(program[0].operand, 10);
        assert_eq!(program[0].phases.len(), 3);
        assert_eq!(
            program[1].meta,
            Meta::CondJump {
                flag: Flag::Zero,
                on_true: 0,
                on_false: 2
            }
        );
        assert_eq!(program[2].addr, 2);
    }

    #[test]
    fn jump_targets_are_pcs() {
        // Data words between instructions make addresses and pcs differ
        let src = "SOB there\nd: DATA 1, 2, 3\nthere: SOM back\nback: STP";
        let program = gen(src).unwrap();
        assert_eq!(program[1].addr, 4);
        assert_eq!(program[0].meta, Meta::Jump { target: 1 });
        assert_eq!(
            program[1].meta,
            Meta::CondJump {
                flag: Flag::Negative,
                on_true: 2,
                on_false: 2
            }
        );
    }

    #[test]
    fn dangling_jump() {
        let err = gen("SOB data\nSTP\ndata: RST 0").unwrap_err();
        assert_eq!(err.code(), "gen::dangling_jump");
    }

    #[test]
    fn conditional_jump_cannot_fall_off_the_end() {
        let err = gen("loop: POB 0\nSOZ loop").unwrap_err();
        assert_eq!(err.code(), "gen::dangling_jump");
        assert!(err.message().contains("address 2"));

        let err = gen("STP\nIF Z THEN 0").unwrap_err();
        assert_eq!(err.code(), "gen::dangling_jump");

        // An explicit `ELSE` or an unconditional jump may end the program
        assert!(gen("STP\nIF Z THEN 0 ELSE 0").is_ok());
        assert!(gen("STP\nSOB 0").is_ok());
    }

    #[test]
    fn jump_without_target_is_rejected() {
        let mut table = crate::templates::standard_table();
        for def in table.iter_mut().filter(|def| def.name == "SOB") {
            def.args = Some(0);
        }
        let (registry, _) = Registry::build(&table).unwrap();
        let resolved = analyze(parse("STP\nSOB").unwrap(), &registry).unwrap();
        let err = generate(
            &resolved,
            &registry,
            &TemplateLibrary::standard(),
            SignalSet::available(&Features::default()),
        )
        .unwrap_err();
        assert_eq!(err.code(), "sema::operand_shape");
    }

    #[test]
    fn conditional_nodes() {
        let program = gen("IF N THEN @neg ELSE @pos\nneg: STP\npos: STP").unwrap();
        assert_eq!(
            program[0].meta,
            Meta::CondJump {
                flag: Flag::Negative,
                on_true: 1,
                on_false: 2
            }
        );
        assert_eq!(program[0].operand, 1);
        assert!(matches!(program[0].phases[1], Phase::Branch(_)));

        let program = gen("IF Z THEN 1\nSTP").unwrap();
        assert_eq!(
            program[0].meta,
            Meta::CondJump {
                flag: Flag::Zero,
                on_true: 1,
                on_false: 1
            }
        );
    }

    #[test]
    fn feature_gated_instructions() {
        let err = gen("WST\nSTP").unwrap_err();
        assert_eq!(err.code(), "gen::bad_template");
        let features = Features {
            stack: true,
            ..Default::default()
        };
        assert!(gen_with("WST\nSTP", features).is_ok());
    }

    #[test]
    fn no_template_for_unwired_mnemonic() {
        let mut table = crate::templates::standard_table();
        table.push(CommandDef::exec("NOP", 0, &[]));
        let (registry, _) = Registry::build(&table).unwrap();
        let resolved = analyze(parse("NOP\nSTP").unwrap(), &registry).unwrap();
        let err = generate(
            &resolved,
            &registry,
            &TemplateLibrary::standard(),
            SignalSet::available(&Features::default()),
        )
        .unwrap_err();
        assert_eq!(err.code(), "gen::no_template");
    }

    #[test]
    fn declarations_only_is_empty() {
        let err = gen("x: RST 1").unwrap_err();
        assert_eq!(err.code(), "compile::empty");
    }
}
