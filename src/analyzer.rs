use fxhash::FxHashSet;

use crate::{
    ast::{Directive, Node, Operand, OperandKind, Program},
    error::{self, Result},
    registry::{Kind, Registry},
    signal::Flag,
    symbol::{is_operand_register, SymbolTable},
    templates::jump_kind,
};

/// Largest value an immediate operand may take.
pub const MAX_IMMEDIATE: i64 = 65535;

/// Word placed in memory before execution starts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MemoryInit {
    pub address: u16,
    pub value: u16,
}

/// Program with every label reference replaced by its address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Resolved {
    pub body: Vec<Node>,
    pub symbols: SymbolTable,
    pub memory: Vec<MemoryInit>,
}

/// Collect labels, validate operands, resolve references and extract initial memory.
pub fn analyze(program: Program, registry: &Registry) -> Result<Resolved> {
    let body = normalize(program.body, registry);

    let addresses = layout(&body, registry)?;
    check_overlap(&body, &addresses, registry)?;
    let mut symbols = SymbolTable::new();
    for (node, addr) in body.iter().zip(&addresses) {
        if let Node::Label(label) = node {
            if symbols.insert(&label.name, *addr).is_err() {
                return Err(error::sema_duplicate_label(label.span, &label.name));
            }
        }
    }

    for node in &body {
        validate(node, registry)?;
    }

    let body = body
        .into_iter()
        .map(|node| resolve(node, &symbols))
        .collect::<Result<Vec<_>>>()?;

    let memory = extract_memory(&body, &addresses, registry)?;

    Ok(Resolved {
        body,
        symbols,
        memory,
    })
}

/// Table entries that are not executable are directives, however they were written.
fn normalize(body: Vec<Node>, registry: &Registry) -> Vec<Node> {
    body.into_iter()
        .map(|node| match node {
            Node::Instruction(instr)
                if registry
                    .get(&instr.name)
                    .is_some_and(|def| def.kind != Kind::Exec) =>
            {
                Node::Directive(Directive {
                    name: instr.name,
                    operands: instr.operands,
                    line: instr.line,
                    span: instr.span,
                })
            }
            node => node,
        })
        .collect()
}

/// Memory address of every node.
///
/// Instructions and conditionals take one word, memory declarations one word per operand (at least
/// one), `ORG` moves the cursor and labels take no space.
pub(crate) fn layout(body: &[Node], registry: &Registry) -> Result<Vec<u16>> {
    let mut cursor: i64 = 0;
    let mut addresses = Vec::with_capacity(body.len());
    for node in body {
        if cursor > MAX_IMMEDIATE {
            return Err(error::sema_out_of_range(
                node.span(),
                cursor,
                MAX_IMMEDIATE as u32,
            ));
        }
        addresses.push(cursor as u16);
        match node {
            Node::Label(_) => {}
            Node::Instruction(_) | Node::Conditional(_) => cursor += 1,
            Node::Directive(dir) => {
                let Some(def) = registry.get(&dir.name) else {
                    return Err(error::sema_unknown_instruction(dir.span, &dir.name));
                };
                if dir.name == "ORG" {
                    cursor = origin(dir)?;
                    // `ORG` itself occupies nothing, so it reports its target
                    if let Some(last) = addresses.last_mut() {
                        *last = cursor.min(MAX_IMMEDIATE) as u16;
                    }
                } else if def.kind == Kind::Memory {
                    cursor += dir.operands.len().max(1) as i64;
                }
            }
        }
    }
    Ok(addresses)
}

/// Every instruction, conditional and memory word needs an address of its own.
fn check_overlap(body: &[Node], addresses: &[u16], registry: &Registry) -> Result<()> {
    let mut taken = FxHashSet::default();
    for (node, &addr) in body.iter().zip(addresses) {
        let words = match node {
            Node::Instruction(_) | Node::Conditional(_) => 1,
            Node::Directive(dir)
                if registry.get(&dir.name).map(|def| def.kind) == Some(Kind::Memory) =>
            {
                dir.operands.len().max(1)
            }
            _ => 0,
        };
        for offset in 0..words {
            let word = addr as usize + offset;
            if word > MAX_IMMEDIATE as usize {
                break;
            }
            if !taken.insert(word as u16) {
                return Err(error::sema_overlap(node.span(), word as u16));
            }
        }
    }
    Ok(())
}

fn origin(dir: &Directive) -> Result<i64> {
    let [operand] = dir.operands.as_slice() else {
        return Err(error::sema_arity(dir.span, "ORG", "1", dir.operands.len()));
    };
    let Some(value) = operand.immediate() else {
        return Err(error::sema_operand_shape(operand.span, "`ORG`"));
    };
    check_range(operand, value)?;
    Ok(value)
}

fn check_range(operand: &Operand, value: i64) -> Result<()> {
    if !(0..=MAX_IMMEDIATE).contains(&value) {
        return Err(error::sema_out_of_range(
            operand.span,
            value,
            MAX_IMMEDIATE as u32,
        ));
    }
    Ok(())
}

fn validate(node: &Node, registry: &Registry) -> Result<()> {
    match node {
        Node::Label(_) => Ok(()),
        Node::Instruction(instr) => {
            let Some(def) = registry.get(&instr.name) else {
                return Err(error::sema_unknown_instruction(instr.span, &instr.name));
            };
            if !def.accepts(instr.operands.len()) {
                return Err(error::sema_arity(
                    instr.span,
                    &instr.name,
                    &def.arity(),
                    instr.operands.len(),
                ));
            }
            let jumps = jump_kind(&instr.name).is_some();
            for operand in &instr.operands {
                match &operand.kind {
                    OperandKind::Immediate(value) => check_range(operand, *value)?,
                    OperandKind::Register(name) if !is_operand_register(name) => {
                        return Err(error::sema_unknown_register(operand.span, name));
                    }
                    // Jump targets are addresses, never register contents
                    OperandKind::Register(_) if jumps => {
                        return Err(error::sema_operand_shape(
                            operand.span,
                            &format!("`{}`", instr.name),
                        ));
                    }
                    OperandKind::Register(_) | OperandKind::LabelRef(_) => {}
                }
            }
            Ok(())
        }
        Node::Directive(dir) => {
            let Some(def) = registry.get(&dir.name) else {
                return Err(error::sema_unknown_instruction(dir.span, &dir.name));
            };
            if !def.accepts(dir.operands.len()) {
                return Err(error::sema_arity(
                    dir.span,
                    &dir.name,
                    &def.arity(),
                    dir.operands.len(),
                ));
            }
            for operand in &dir.operands {
                match &operand.kind {
                    OperandKind::Immediate(value) => check_range(operand, *value)?,
                    OperandKind::Register(_) => {
                        return Err(error::sema_operand_shape(
                            operand.span,
                            &format!("`{}`", dir.name),
                        ));
                    }
                    OperandKind::LabelRef(_) => {}
                }
            }
            Ok(())
        }
        Node::Conditional(cond) => {
            if Flag::parse(&cond.test).is_none() {
                return Err(error::sema_unknown_flag(cond.test_span, &cond.test));
            }
            for operand in std::iter::once(&cond.then_branch).chain(&cond.else_branch) {
                match &operand.kind {
                    OperandKind::Immediate(value) => check_range(operand, *value)?,
                    OperandKind::Register(_) => {
                        return Err(error::sema_operand_shape(
                            operand.span,
                            "a conditional branch",
                        ));
                    }
                    OperandKind::LabelRef(_) => {}
                }
            }
            Ok(())
        }
    }
}

fn resolve_operand(operand: Operand, symbols: &SymbolTable) -> Result<Operand> {
    match operand.kind {
        OperandKind::LabelRef(ref name) => match symbols.get(name) {
            Some(addr) => Ok(Operand {
                kind: OperandKind::Immediate(addr as i64),
                span: operand.span,
            }),
            None => Err(error::sema_undefined_symbol(operand.span, name)),
        },
        _ => Ok(operand),
    }
}

fn resolve_all(operands: Vec<Operand>, symbols: &SymbolTable) -> Result<Vec<Operand>> {
    operands
        .into_iter()
        .map(|operand| resolve_operand(operand, symbols))
        .collect()
}

fn resolve(node: Node, symbols: &SymbolTable) -> Result<Node> {
    Ok(match node {
        Node::Label(_) => node,
        Node::Instruction(mut instr) => {
            instr.operands = resolve_all(instr.operands, symbols)?;
            Node::Instruction(instr)
        }
        Node::Directive(mut dir) => {
            dir.operands = resolve_all(dir.operands, symbols)?;
            Node::Directive(dir)
        }
        Node::Conditional(mut cond) => {
            cond.then_branch = resolve_operand(cond.then_branch, symbols)?;
            cond.else_branch = cond
                .else_branch
                .map(|operand| resolve_operand(operand, symbols))
                .transpose()?;
            Node::Conditional(cond)
        }
    })
}

fn extract_memory(
    body: &[Node],
    addresses: &[u16],
    registry: &Registry,
) -> Result<Vec<MemoryInit>> {
    let mut memory = Vec::new();
    for (i, node) in body.iter().enumerate() {
        let Node::Directive(dir) = node else {
            continue;
        };
        if registry.get(&dir.name).map(|def| def.kind) != Some(Kind::Memory) {
            continue;
        }
        if i == 0 || !matches!(body[i - 1], Node::Label(_)) {
            return Err(error::sema_unlabeled_memory(dir.span, &dir.name));
        }
        let base = addresses[i] as i64;
        let values = if dir.operands.is_empty() {
            vec![0]
        } else {
            dir.operands.iter().filter_map(Operand::immediate).collect()
        };
        for (offset, value) in values.into_iter().enumerate() {
            let address = base + offset as i64;
            if address > MAX_IMMEDIATE {
                return Err(error::sema_out_of_range(
                    dir.span,
                    address,
                    MAX_IMMEDIATE as u32,
                ));
            }
            memory.push(MemoryInit {
                address: address as u16,
                value: value as u16,
            });
        }
    }
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(src: &str) -> Result<Resolved> {
        analyze(parse(src).unwrap(), &Registry::standard())
    }

    fn code(src: &str) -> &'static str {
        run(src).unwrap_err().code()
    }

    #[test]
    fn assigns_addresses() {
        let resolved = run("start: POB 10\nSOZ start\nend: STP\nORG 10\nx: RST 7").unwrap();
        assert_eq!(resolved.symbols.get("start"), Some(0));
        assert_eq!(resolved.symbols.get("end"), Some(2));
        assert_eq!(resolved.symbols.get("x"), Some(10));
        assert_eq!(
            resolved.memory,
            vec![MemoryInit {
                address: 10,
                value: 7
            }]
        );
    }

    #[test]
    fn declarations_advance_cursor() {
        let resolved = run("a: DATA 1, 2, 3\nb: RPA\nc: RST 4\nd: STP").unwrap();
        assert_eq!(resolved.symbols.get("b"), Some(3));
        assert_eq!(resolved.symbols.get("c"), Some(4));
        assert_eq!(resolved.symbols.get("d"), Some(5));
        let values = resolved
            .memory
            .iter()
            .map(|init| (init.address, init.value))
            .collect::<Vec<_>>();
        assert_eq!(values, vec![(0, 1), (1, 2), (2, 3), (3, 0), (4, 4)]);
    }

    #[test]
    fn resolves_forward_and_backward_references() {
        let resolved = run("back: SOB fwd\nSOB back\nfwd: STP").unwrap();
        let targets = resolved
            .body
            .iter()
            .filter_map(|node| match node {
                Node::Instruction(instr) => instr.operands.first().and_then(Operand::immediate),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(targets, vec![2, 0]);
    }

    #[test]
    fn labels_resolve_inside_directives_and_conditionals() {
        let resolved = run("IF Z THEN @end ELSE loop\nloop: STP\nend: STP\np: RST end").unwrap();
        match &resolved.body[0] {
            Node::Conditional(cond) => {
                assert_eq!(cond.then_branch.immediate(), Some(2));
                assert_eq!(cond.else_branch.as_ref().and_then(Operand::immediate), Some(1));
            }
            other => panic!("expected conditional, found {other:?}"),
        }
        assert_eq!(resolved.memory[0].value, 2);
    }

    #[test]
    fn undefined_symbol_names_the_label() {
        let err = run("SOB nowhere\nSTP").unwrap_err();
        assert_eq!(err.code(), "sema::undefined_symbol");
        assert!(err.message().contains("nowhere"));
    }

    #[test]
    fn duplicate_labels_fail_anywhere() {
        assert_eq!(code("a: STP\na: STP"), "sema::duplicate_label");
        assert_eq!(code("a: STP\nSTP\nb: RST 1\na: RPA"), "sema::duplicate_label");
    }

    #[test]
    fn operand_errors() {
        assert_eq!(code("POB 70000"), "sema::out_of_range");
        assert_eq!(code("POB -1"), "sema::out_of_range");
        assert_eq!(code("POB R3"), "sema::unknown_register");
        assert!(run("POB AK").is_ok());
        assert_eq!(code("RST 1"), "sema::unlabeled_memory");
        assert_eq!(code("STP\nRPA"), "sema::unlabeled_memory");
        assert_eq!(code("IF C THEN 0"), "sema::unknown_flag");
        assert_eq!(code("ORG start\nstart: STP"), "sema::operand_shape");
        assert_eq!(code("x: RST AK"), "sema::operand_shape");
        assert_eq!(code("FOO 1"), "sema::unknown_instruction");
        assert_eq!(code(".bogus 1"), "sema::unknown_instruction");
        assert_eq!(code("POB 1, 2"), "sema::arity");
        assert_eq!(code("STP 1"), "sema::arity");
        assert_eq!(code("x: RST"), "sema::arity");
    }

    #[test]
    fn overlapping_placement_is_rejected() {
        assert_eq!(code("a: STP\nORG 0\nb: SOB a"), "sema::overlap");
        assert_eq!(code("x: DATA 1, 2, 3\nORG 2\nSTP"), "sema::overlap");
        let err = run("STP\nSTP\nORG 1\ny: RST 4").unwrap_err();
        assert!(err.message().contains("Address 1"));
        // Gaps are fine, and so is an `ORG` onto free space
        assert!(run("a: STP\nORG 8\nb: SOB a\nORG 1\nc: RST 0").is_ok());
    }

    #[test]
    fn jumps_need_address_operands() {
        assert_eq!(code("STP\nSOB AK"), "sema::operand_shape");
        assert_eq!(code("STP\nSOZ ak"), "sema::operand_shape");
        assert!(run("STP\nSOB 0").is_ok());
    }

    #[test]
    fn user_memory_kind_acts_as_directive() {
        use crate::registry::CommandDef;
        let mut table = crate::templates::standard_table();
        table.push(CommandDef {
            name: "BUF".into(),
            args_min: Some(0),
            kind: Kind::Memory,
            ..Default::default()
        });
        let (registry, _) = Registry::build(&table).unwrap();
        let resolved = analyze(parse("b: BUF 5, 6\nnext: STP").unwrap(), &registry).unwrap();
        assert_eq!(resolved.symbols.get("next"), Some(2));
        assert_eq!(resolved.memory.len(), 2);
    }
}
