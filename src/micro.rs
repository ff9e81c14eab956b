use lazy_static::lazy_static;
use regex::Regex;

use fxhash::FxHashMap;

use crate::{
    analyzer::MemoryInit,
    error::{self, Result},
    features::Features,
    microcode::{Branch, Meta, MicroprogramEntry, Origin, Phase},
    signal::{Flag, Signal, SignalSet},
    span::{Idx, Span},
};

lazy_static! {
    /// Anything between whitespace and `;` separators.
    static ref WORD: Regex = Regex::new(r"[^\s;]+").unwrap();
}

/// Signals that read the next instruction word and advance the line counter.
pub fn fetch_phase() -> SignalSet {
    SignalSet::of(&[Signal::Czyt, Signal::Wei, Signal::Il])
}

/// What the micro-assembler accepts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MicroConfig {
    /// Signals allowed to appear in source
    pub available: SignalSet,
    /// Phase that opens a new microprogram entry
    pub entry_boundary: SignalSet,
}

impl MicroConfig {
    pub fn new(features: &Features) -> Self {
        MicroConfig {
            available: SignalSet::available(features),
            entry_boundary: fetch_phase(),
        }
    }

    pub fn with_boundary(mut self, boundary: SignalSet) -> Self {
        self.entry_boundary = boundary;
        self
    }
}

impl Default for MicroConfig {
    fn default() -> Self {
        MicroConfig::new(&Features::default())
    }
}

/// Output of the micro-assembler.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LowLevelProgram {
    pub program: Vec<MicroprogramEntry>,
    /// Words declared with `.data`
    pub memory: Vec<MemoryInit>,
    /// Trimmed source of every phase line, branch bodies included
    pub raw_lines: Vec<String>,
}

/// Compile raw signal lines into a microprogram.
///
/// Besides phase lines the source may hold directives:
///
/// - `.entry ADDR [OPERAND]` opens an entry at `ADDR` whose `wei` latches `OPERAND`
/// - `.jump ADDR` or `.jump FLAG ADDR [ADDR]` sets where the current entry retires to
/// - `.data ADDR VALUE...` seeds memory from `ADDR` on
///
/// Entries without `.entry` follow the previous one in memory and carry operand 0.
pub fn compile(src: &str, config: &MicroConfig) -> Result<LowLevelProgram> {
    compile_inner(src, config).map_err(|err| err.with_source(src))
}

/// `.entry` or `.jump` waiting for the phase that opens its entry.
#[derive(Default)]
struct Header {
    entry: Option<(u16, u16)>,
    jump: Option<Jump>,
    span: Option<Span>,
}

fn compile_inner(src: &str, config: &MicroConfig) -> Result<LowLevelProgram> {
    let items = parse_items(src, config.available)?;

    let mut raw_lines = Vec::new();
    let mut memory = Vec::new();
    let mut program: Vec<MicroprogramEntry> = Vec::new();
    let mut jumps: Vec<(usize, Jump)> = Vec::new();
    let mut pcs = FxHashMap::default();
    let mut header = Header::default();
    let mut open = false;
    for item in items {
        let parsed = match item {
            Item::Directive(Directive::Data { addr, values }) => {
                for (offset, value) in values.into_iter().enumerate() {
                    let Some(address) = addr.0.checked_add(offset as u16) else {
                        return Err(error::micro_directive(
                            addr.1,
                            "Data runs past the last address",
                        ));
                    };
                    memory.push(MemoryInit { address, value });
                }
                continue;
            }
            Item::Directive(Directive::Entry { addr, operand, span }) => {
                if header.entry.is_some() {
                    return Err(error::micro_directive(
                        span,
                        "`.entry` follows an entry with no phases",
                    ));
                }
                header.entry = Some((addr, operand));
                header.span = Some(span);
                continue;
            }
            Item::Directive(Directive::Jump(jump)) => {
                if header.entry.is_some() {
                    if header.jump.is_some() {
                        return Err(error::micro_directive(
                            jump.span,
                            "Entry already has a `.jump`",
                        ));
                    }
                    header.jump = Some(jump);
                } else {
                    let Some(entry) = program.last() else {
                        return Err(error::micro_directive(
                            jump.span,
                            "`.jump` before any entry",
                        ));
                    };
                    if jumps.iter().any(|(pc, _)| *pc == entry.pc) {
                        return Err(error::micro_directive(
                            jump.span,
                            "Entry already has a `.jump`",
                        ));
                    }
                    jumps.push((entry.pc, jump));
                }
                continue;
            }
            Item::Phase(parsed) => parsed,
        };

        raw_lines.extend(parsed.raw.iter().cloned());
        let is_boundary =
            matches!(parsed.phase, Phase::Signals(set) if set == config.entry_boundary);
        let declared = std::mem::take(&mut header);
        if declared.entry.is_some() || is_boundary || !open {
            let pc = program.len();
            let (addr, operand) = declared.entry.unwrap_or_else(|| {
                let addr = program.last().map_or(0, |entry| entry.addr.wrapping_add(1));
                (addr, 0)
            });
            if pcs.insert(addr, pc).is_some() {
                let span = declared.span.unwrap_or(parsed.span);
                return Err(error::micro_directive(
                    span,
                    &format!("Address {addr} already holds an entry"),
                ));
            }
            if let Some(jump) = declared.jump {
                jumps.push((pc, jump));
            }
            program.push(MicroprogramEntry {
                pc,
                addr,
                operand,
                origin: match &parsed.label {
                    Some(label) => Origin::Label(label.clone()),
                    None => Origin::Line(parsed.line),
                },
                text: parsed.raw[0].clone(),
                phases: Vec::new(),
                meta: Meta::None,
            });
            open = true;
        }
        let closes = parsed.phase.signals().contains(Signal::Stop);
        if let Some(entry) = program.last_mut() {
            entry.phases.push(parsed.phase);
        }
        if closes {
            open = false;
        }
    }
    if let Some(span) = header.span {
        return Err(error::micro_directive(span, "`.entry` has no phases"));
    }
    if program.is_empty() {
        return Err(error::compile_empty());
    }

    for (pc, jump) in jumps {
        let target = |addr: u16, span: Span| {
            pcs.get(&addr)
                .copied()
                .ok_or_else(|| error::gen_dangling_jump(span, addr))
        };
        let on_true = target(jump.target.0, jump.target.1)?;
        let meta = match jump.flag {
            None => Meta::Jump { target: on_true },
            Some(flag) => {
                let on_false = match jump.otherwise {
                    Some((addr, span)) => target(addr, span)?,
                    None if pc + 1 < program.len() => pc + 1,
                    None => {
                        return Err(error::gen_dangling_jump(
                            jump.span,
                            program[pc].addr.wrapping_add(1),
                        ))
                    }
                };
                Meta::CondJump {
                    flag,
                    on_true,
                    on_false,
                }
            }
        };
        program[pc].meta = meta;
    }

    Ok(LowLevelProgram {
        program,
        memory,
        raw_lines,
    })
}

/// One phase together with the line(s) it was written on.
#[derive(Clone, Debug)]
pub(crate) struct ParsedPhase {
    pub phase: Phase,
    /// 1-based line of the phase (or of its conditional)
    pub line: u32,
    pub span: Span,
    /// `@label` of that line, or of a label-only line right before it
    pub label: Option<String>,
    pub raw: Vec<String>,
}

/// Control flow given by `.jump`, with addresses still unresolved.
#[derive(Clone, Debug)]
struct Jump {
    flag: Option<Flag>,
    target: (u16, Span),
    otherwise: Option<(u16, Span)>,
    span: Span,
}

#[derive(Clone, Debug)]
enum Directive {
    Entry { addr: u16, operand: u16, span: Span },
    Jump(Jump),
    Data { addr: (u16, Span), values: Vec<u16> },
}

enum Item {
    Phase(ParsedPhase),
    Directive(Directive),
}

#[derive(Clone, Copy, Debug)]
struct Word<'a> {
    text: &'a str,
    span: Span,
}

struct Line<'a> {
    number: u32,
    raw: &'a str,
    label: Option<Word<'a>>,
    words: Vec<Word<'a>>,
    /// Span of the whole line, for errors about missing parts
    span: Span,
}

/// Parse phase lines without grouping them into entries. Directives are refused.
pub(crate) fn parse_phases(src: &str, available: SignalSet) -> Result<Vec<ParsedPhase>> {
    let lines = split_lines(src);
    if let Some(line) = lines.iter().find(|line| is_directive(line)) {
        return Err(error::micro_directive(line.span, "Directives are not allowed here"));
    }
    let phases = parse_items(src, available)?
        .into_iter()
        .filter_map(|item| match item {
            Item::Phase(parsed) => Some(parsed),
            Item::Directive(_) => None,
        })
        .collect();
    Ok(phases)
}

fn is_directive(line: &Line) -> bool {
    line.words.first().is_some_and(|word| word.text.starts_with('.'))
}

fn parse_items(src: &str, available: SignalSet) -> Result<Vec<Item>> {
    let lines = split_lines(src);
    let mut items = Vec::new();
    let mut pending_label = None;
    let mut iter = lines.iter();
    while let Some(line) = iter.next() {
        let label = line
            .label
            .map(|word| word.text[1..].to_string())
            .or_else(|| pending_label.take());
        // A bare `@label;` names whatever phase comes next
        if line.words.is_empty() {
            pending_label = label;
            continue;
        }
        if is_directive(line) {
            pending_label = label;
            items.push(Item::Directive(parse_directive(line)?));
            continue;
        }

        let Some(if_pos) = line
            .words
            .iter()
            .position(|word| word.text.eq_ignore_ascii_case("IF"))
        else {
            items.push(Item::Phase(ParsedPhase {
                phase: Phase::Signals(parse_signals(&line.words, available)?),
                line: line.number,
                span: line.span,
                label,
                raw: vec![line.raw.to_string()],
            }));
            continue;
        };

        let common = parse_signals(&line.words[..if_pos], available)?;
        let cond = parse_condition(line, &line.words[if_pos + 1..])?;
        let mut raw = vec![line.raw.to_string()];

        let on_true = parse_body(iter.next(), &cond.on_true, line, available)?;
        raw.push(on_true.1.to_string());
        let on_false = match &cond.on_false {
            Some(label) => {
                let body = parse_body(iter.next(), label, line, available)?;
                raw.push(body.1.to_string());
                vec![body.0]
            }
            None => Vec::new(),
        };

        items.push(Item::Phase(ParsedPhase {
            phase: Phase::Branch(Branch {
                common,
                flag: cond.flag,
                on_true: vec![on_true.0],
                on_false,
            }),
            line: line.number,
            span: line.span,
            label,
            raw,
        }));
    }
    Ok(items)
}

fn parse_directive(line: &Line) -> Result<Directive> {
    let (name, args) = line
        .words
        .split_first()
        .ok_or_else(|| error::micro_directive(line.span, "Expected a directive"))?;
    let numbers = args
        .iter()
        .map(|word| parse_number(word).map(|value| (value, word.span)));
    match name.text.to_ascii_lowercase().as_str() {
        ".entry" => {
            let values = numbers.collect::<Result<Vec<_>>>()?;
            match values.as_slice() {
                [(addr, _)] => Ok(Directive::Entry {
                    addr: *addr,
                    operand: 0,
                    span: line.span,
                }),
                [(addr, _), (operand, _)] => Ok(Directive::Entry {
                    addr: *addr,
                    operand: *operand,
                    span: line.span,
                }),
                _ => Err(error::micro_directive(
                    line.span,
                    "`.entry` takes an address and an optional operand",
                )),
            }
        }
        ".jump" => {
            let (flag, targets) = match args.first().and_then(|word| Flag::parse(word.text)) {
                Some(flag) => (Some(flag), &args[1..]),
                None => (None, args),
            };
            let targets = targets
                .iter()
                .map(|word| parse_number(word).map(|value| (value, word.span)))
                .collect::<Result<Vec<_>>>()?;
            let (target, otherwise) = match (flag, targets.as_slice()) {
                (_, [target]) => (*target, None),
                (Some(_), [target, otherwise]) => (*target, Some(*otherwise)),
                _ => {
                    return Err(error::micro_directive(
                        line.span,
                        "`.jump` takes `ADDR` or `FLAG ADDR [ADDR]`",
                    ))
                }
            };
            Ok(Directive::Jump(Jump {
                flag,
                target,
                otherwise,
                span: line.span,
            }))
        }
        ".data" => {
            let values = numbers.collect::<Result<Vec<_>>>()?;
            match values.split_first() {
                Some((addr, rest)) if !rest.is_empty() => Ok(Directive::Data {
                    addr: *addr,
                    values: rest.iter().map(|(value, _)| *value).collect(),
                }),
                _ => Err(error::micro_directive(
                    line.span,
                    "`.data` takes an address and at least one value",
                )),
            }
        }
        _ => Err(error::micro_directive(
            name.span,
            &format!("Unknown directive `{}`", name.text),
        )),
    }
}

/// Decimal, `0x` hex or `0b` binary word.
fn parse_number(word: &Word) -> Result<u16> {
    let text = word.text;
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u16::from_str_radix(bin, 2)
    } else {
        text.parse()
    };
    parsed.map_err(|_| {
        error::micro_directive(word.span, &format!("Expected a number, found `{text}`"))
    })
}

struct Condition {
    flag: Flag,
    on_true: String,
    on_false: Option<String>,
}

/// `flag THEN @t [ELSE @f]`, the part after `IF`.
fn parse_condition(line: &Line, words: &[Word]) -> Result<Condition> {
    let Some(flag_word) = words.first() else {
        return Err(error::micro_condition(
            line.span,
            "Expected a flag after `IF`",
        ));
    };
    let Some(flag) = Flag::parse(flag_word.text) else {
        return Err(error::micro_condition(
            flag_word.span,
            &format!("Unknown condition flag `{}`", flag_word.text),
        ));
    };
    let on_true = keyword_label(line, &words[1..], "THEN")?;
    let on_false = match words.get(3) {
        None => None,
        Some(_) => Some(keyword_label(line, &words[3..], "ELSE")?),
    };
    if let Some(extra) = words.get(5) {
        return Err(error::micro_condition(
            extra.span,
            &format!("Unexpected `{}` after conditional", extra.text),
        ));
    }
    Ok(Condition {
        flag,
        on_true,
        on_false,
    })
}

/// `KEYWORD @label`
fn keyword_label(line: &Line, words: &[Word], keyword: &str) -> Result<String> {
    match words {
        [kw, label, ..] if kw.text.eq_ignore_ascii_case(keyword) => {
            match label.text.strip_prefix('@') {
                Some(name) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(error::micro_condition(
                    label.span,
                    &format!("Expected `@label` after `{keyword}`"),
                )),
            }
        }
        [kw] if kw.text.eq_ignore_ascii_case(keyword) => Err(error::micro_condition(
            kw.span,
            &format!("Expected `@label` after `{keyword}`"),
        )),
        [other, ..] => Err(error::micro_condition(
            other.span,
            &format!("Expected `{keyword}`, found `{}`", other.text),
        )),
        [] => Err(error::micro_condition(
            line.span,
            &format!("Expected `{keyword}`"),
        )),
    }
}

/// Branch body on the line following a conditional, introduced by `@expected`.
fn parse_body<'a>(
    line: Option<&Line<'a>>,
    expected: &str,
    cond_line: &Line,
    available: SignalSet,
) -> Result<(SignalSet, &'a str)> {
    let Some(line) = line else {
        return Err(error::micro_branch_label(cond_line.span, expected));
    };
    match line.label {
        Some(label) if &label.text[1..] == expected => {}
        Some(label) => return Err(error::micro_branch_label(label.span, expected)),
        None => return Err(error::micro_branch_label(line.span, expected)),
    }
    if let Some(word) = line
        .words
        .iter()
        .find(|word| word.text.eq_ignore_ascii_case("IF"))
    {
        return Err(error::micro_condition(
            word.span,
            "Branch bodies cannot contain conditionals",
        ));
    }
    Ok((parse_signals(&line.words, available)?, line.raw))
}

fn parse_signals(words: &[Word], available: SignalSet) -> Result<SignalSet> {
    let mut set = SignalSet::empty();
    for word in words {
        match word.text.parse::<Signal>() {
            Ok(sig) if available.contains(sig) => set.insert(sig),
            _ => return Err(error::micro_unknown_symbol(word.span, word.text)),
        }
    }
    Ok(set)
}

/// Non-empty lines with comments removed and the leading label split off.
fn split_lines(src: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (i, full) in src.split('\n').enumerate() {
        let start = offset;
        offset += full.len() + 1;

        let mut text = full.strip_suffix('\r').unwrap_or(full);
        if let Some(pos) = comment_start(text) {
            text = &text[..pos];
        }
        let number = i as u32 + 1;
        let mut words = WORD
            .find_iter(text)
            .map(|m| Word {
                text: m.as_str(),
                span: Span::new(
                    Idx((start + m.start()) as u32),
                    m.as_str().len() as u32,
                    number,
                    text[..m.start()].chars().count() as u32 + 1,
                ),
            })
            .collect::<Vec<_>>();
        let Some(first) = words.first().copied() else {
            continue;
        };
        let last = words[words.len() - 1];
        let label = if first.text.starts_with('@') {
            Some(words.remove(0))
        } else {
            None
        };
        lines.push(Line {
            number,
            raw: text.trim().trim_end_matches(';').trim_end(),
            label,
            words,
            span: first.span.join(last.span),
        });
    }
    lines
}

fn comment_start(text: &str) -> Option<usize> {
    match (text.find("//"), text.find('#')) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microcode::render;

    fn sigs(text: &str) -> SignalSet {
        text.parse().unwrap()
    }

    #[test]
    fn fetch_triplet_is_one_entry() {
        let out = compile("czyt; wei; il", &MicroConfig::default()).unwrap();
        assert_eq!(out.program.len(), 1);
        let entry = &out.program[0];
        assert_eq!(entry.phases, vec![Phase::Signals(sigs("czyt wei il"))]);
        assert_eq!(entry.pc, 0);
        assert_eq!(out.raw_lines, vec!["czyt; wei; il"]);
    }

    #[test]
    fn boundaries_and_stop_split_entries() {
        let src = "\
            czyt wei il;\n\
            wyad wea;   // operand address\n\
            czyt wys weja przep weak wyl wea;\n\
            czyt wei il;\n\
            stop;\n\
            wyl wea;\n";
        let out = compile(src, &MicroConfig::default()).unwrap();
        assert_eq!(out.program.len(), 3);
        assert_eq!(out.program[0].phases.len(), 3);
        assert_eq!(out.program[1].phases.len(), 2);
        assert_eq!(out.program[2].phases, vec![Phase::Signals(sigs("wyl wea"))]);
        assert_eq!(out.program[2].addr, 2);
        assert_eq!(out.program[1].origin, Origin::Line(4));
    }

    #[test]
    fn inline_conditional_with_common_prefix() {
        let src = "\
            czyt wei il;\n\
            wyl IF ujemny THEN @yes ELSE @no;\n\
            @yes wyad wel wea;\n\
            @no wea;\n";
        let out = compile(src, &MicroConfig::default()).unwrap();
        let entry = &out.program[0];
        assert_eq!(
            entry.phases[1],
            Phase::Branch(Branch {
                common: sigs("wyl"),
                flag: Flag::Negative,
                on_true: vec![sigs("wyad wel wea")],
                on_false: vec![sigs("wea")],
            })
        );
        assert_eq!(out.raw_lines.len(), 4);
    }

    #[test]
    fn conditional_without_else() {
        let src = "czyt wei il\nIF Z THEN @t\n@t wyad wel wea\nwyl wea";
        let out = compile(src, &MicroConfig::default()).unwrap();
        match &out.program[0].phases[1] {
            Phase::Branch(branch) => assert!(branch.on_false.is_empty()),
            other => panic!("expected branch, found {other:?}"),
        }
        assert_eq!(out.program[0].phases.len(), 3);
    }

    #[test]
    fn errors() {
        let config = MicroConfig::default();
        let err = compile("czyt\nczyt bogus", &config).unwrap_err();
        assert_eq!(err.code(), "micro::unknown_symbol");
        assert!(err.message().contains("bogus"));
        assert!(err.message().contains("line 2"));

        // Signal exists but its feature is off
        let err = compile("push", &config).unwrap_err();
        assert_eq!(err.code(), "micro::unknown_symbol");
        assert!(compile("push", &MicroConfig::new(&Features::all())).is_ok());

        let err = compile("IF Z THEN @a ELSE @b\n@b wea\n@a wea", &config).unwrap_err();
        assert_eq!(err.code(), "micro::branch_label");

        let err = compile("IF Z THEN @a\n", &config).unwrap_err();
        assert_eq!(err.code(), "micro::branch_label");

        let err = compile("IF Q THEN @a\n@a wea", &config).unwrap_err();
        assert_eq!(err.code(), "micro::condition");

        let err = compile("IF Z @a\n@a wea", &config).unwrap_err();
        assert_eq!(err.code(), "micro::condition");
    }

    #[test]
    fn empty_sources_do_not_compile() {
        for src in ["", "   \n\t\n", "// only a comment\n# another"] {
            let err = compile(src, &MicroConfig::default()).unwrap_err();
            assert_eq!(err.code(), "compile::empty");
        }
    }

    #[test]
    fn custom_entry_boundary() {
        let config = MicroConfig::default().with_boundary(sigs("czyt wei"));
        let out = compile("czyt wei\nil\nczyt wei\nil", &config).unwrap();
        assert_eq!(out.program.len(), 2);
    }

    #[test]
    fn rendered_text_recompiles() {
        let src = "\
            czyt wei il;\n\
            IF Z THEN @a ELSE @b;\n\
            @a wyad wel wea;\n\
            @b wyl wea;\n\
            czyt wei il;\n\
            stop;\n";
        let config = MicroConfig::default();
        let first = compile(src, &config).unwrap();
        let second = compile(&render(&first.program, &first.memory), &config).unwrap();
        let shape = |prog: &LowLevelProgram| {
            prog.program
                .iter()
                .map(|entry| (entry.addr, entry.operand, entry.phases.clone(), entry.meta))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn label_only_lines_name_the_next_phase() {
        let out = compile("czyt wei il;\n@loop;\nwyl wea;", &MicroConfig::default()).unwrap();
        assert_eq!(out.program.len(), 1);
        assert_eq!(
            out.program[0].phases,
            vec![
                Phase::Signals(sigs("czyt wei il")),
                Phase::Signals(sigs("wyl wea"))
            ]
        );
        assert_eq!(out.raw_lines, vec!["czyt wei il", "wyl wea"]);

        let out = compile("@start;\nczyt wei il;", &MicroConfig::default()).unwrap();
        assert_eq!(out.program[0].origin, Origin::Label("start".into()));

        let err = compile("@start;", &MicroConfig::default()).unwrap_err();
        assert_eq!(err.code(), "compile::empty");
    }

    #[test]
    fn directives_place_entries_and_memory() {
        let src = "\
            .data 6 3 1\n\
            .entry 0 6\n\
            .jump Z 4\n\
            czyt wei il;\n\
            wyad wea;\n\
            .entry 4\n\
            czyt wei il;\n\
            .jump 0x0\n\
            @done stop;\n";
        let out = compile(src, &MicroConfig::default()).unwrap();
        assert_eq!(out.program.len(), 2);
        let first = &out.program[0];
        assert_eq!((first.addr, first.operand), (0, 6));
        assert_eq!(first.phases.len(), 2);
        assert_eq!(
            first.meta,
            Meta::CondJump {
                flag: Flag::Zero,
                on_true: 1,
                on_false: 1
            }
        );
        let second = &out.program[1];
        assert_eq!((second.addr, second.operand), (4, 0));
        assert_eq!(second.meta, Meta::Jump { target: 0 });
        assert_eq!(
            out.memory,
            vec![
                MemoryInit {
                    address: 6,
                    value: 3
                },
                MemoryInit {
                    address: 7,
                    value: 1
                }
            ]
        );
    }

    #[test]
    fn directive_errors() {
        let config = MicroConfig::default();
        let code = |src: &str| compile(src, &config).unwrap_err().code();
        assert_eq!(code(".jump 0\nczyt wei il"), "micro::directive");
        assert_eq!(code(".entry 0\n.entry 1\nstop"), "micro::directive");
        assert_eq!(code(".entry 0\nstop\n.entry 0\nstop"), "micro::directive");
        assert_eq!(code("czyt wei il\n.entry 3"), "micro::directive");
        assert_eq!(code(".entry x\nstop"), "micro::directive");
        assert_eq!(code(".data 4\nstop"), "micro::directive");
        assert_eq!(code(".origin 4\nstop"), "micro::directive");
        assert_eq!(code(".jump 1 2\nstop"), "micro::directive");
        assert_eq!(code("czyt wei il\n.jump 0\n.jump 0"), "micro::directive");
        assert_eq!(code("czyt wei il\n.jump 9"), "gen::dangling_jump");
        // Conditional on the last entry has nowhere to fall through to
        assert_eq!(code("czyt wei il\n.jump Z 0"), "gen::dangling_jump");
        assert_eq!(code(".data 1 2"), "compile::empty");

        let err = parse_phases(".entry 0\nstop", config.available).unwrap_err();
        assert_eq!(err.code(), "micro::directive");
    }
}
