use crate::{
    analyzer::{analyze, MemoryInit},
    config::MachineConfig,
    error::{self, Diagnostic, Result},
    generator::generate,
    micro::{self, MicroConfig},
    microcode::MicroprogramEntry,
    parser,
    registry::{CommandDef, Registry},
    signal::SignalSet,
    store::Store,
    symbol::SymbolTable,
    templates::{standard_table, TemplateLibrary},
};

/// Everything needed to turn source text into a loaded machine.
#[derive(Clone, Debug)]
pub struct Toolchain {
    config: MachineConfig,
    registry: Registry,
    library: TemplateLibrary,
    /// Produced while building the registry
    warnings: Vec<Diagnostic>,
}

/// Output of either front end.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub program: Vec<MicroprogramEntry>,
    pub memory: Vec<MemoryInit>,
    pub symbols: SymbolTable,
    /// Source line of every phase, micro-assembly only
    pub raw_lines: Vec<String>,
}

impl Toolchain {
    /// Standard W instruction set on a machine of the given geometry.
    pub fn new(config: MachineConfig) -> Self {
        Toolchain {
            config,
            registry: Registry::standard(),
            library: TemplateLibrary::standard(),
            warnings: Vec::new(),
        }
    }

    /// Merge a caller-supplied instruction table over the standard one.
    /// Entries replace standard entries of the same name, but may not repeat among themselves.
    pub fn with_commands(mut self, commands: &[CommandDef]) -> Result<Self> {
        let mut table = standard_table();
        for (i, command) in commands.iter().enumerate() {
            let name = command.name.trim();
            if commands[..i]
                .iter()
                .any(|prev| prev.name.trim().eq_ignore_ascii_case(name))
            {
                return Err(error::registry_duplicate(&name.to_uppercase()));
            }
            match table
                .iter_mut()
                .find(|def| def.name.eq_ignore_ascii_case(name))
            {
                Some(def) => *def = command.clone(),
                None => table.push(command.clone()),
            }
        }
        let (registry, warnings) = Registry::build(&table)?;
        self.registry = registry;
        self.warnings = warnings;
        Ok(self)
    }

    /// Parse a JSON instruction table.
    pub fn commands_from_json(json: &str) -> Result<Vec<CommandDef>> {
        serde_json::from_str(json).map_err(|err| error::registry_json(&err.to_string()))
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    fn available(&self) -> SignalSet {
        SignalSet::available(&self.config.features)
    }

    /// Assembly front end: lex, parse, analyze and generate.
    pub fn assemble(&self, src: &str) -> Result<Compiled> {
        let program = parser::parse(src)?;
        let resolved = analyze(program, &self.registry).map_err(|err| err.with_source(src))?;
        let program = generate(&resolved, &self.registry, &self.library, self.available())
            .map_err(|err| err.with_source(src))?;
        Ok(Compiled {
            program,
            memory: resolved.memory,
            symbols: resolved.symbols,
            raw_lines: Vec::new(),
        })
    }

    /// Micro-assembly front end.
    pub fn compile_micro(&self, src: &str) -> Result<Compiled> {
        let config = MicroConfig::new(&self.config.features);
        let low = micro::compile(src, &config)?;
        Ok(Compiled {
            program: low.program,
            memory: low.memory,
            symbols: SymbolTable::new(),
            raw_lines: low.raw_lines,
        })
    }
}

impl Compiled {
    /// Fresh machine running this program.
    pub fn into_store(self, config: MachineConfig) -> Result<Store> {
        Store::new(config, self.program, &self.memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Features;
    use crate::microcode::Meta;
    use crate::registry::Kind;
    use crate::signal::Flag;

    #[test]
    fn assembles_loop_with_data() {
        let toolchain = Toolchain::new(MachineConfig::default());
        let compiled = toolchain
            .assemble("start: POB 10\nSOZ start\nend: STP\nORG 10\nRST 3")
            .unwrap();
        assert_eq!(compiled.program.len(), 3);
        assert_eq!(compiled.symbols.get("start"), Some(0));
        assert_eq!(compiled.symbols.get("end"), Some(2));
        assert_eq!(
            compiled.program[1].meta,
            Meta::CondJump {
                flag: Flag::Zero,
                on_true: 0,
                on_false: 2
            }
        );
        assert_eq!(
            compiled.memory,
            vec![MemoryInit {
                address: 10,
                value: 3
            }]
        );
    }

    #[test]
    fn errors_carry_source() {
        let toolchain = Toolchain::new(MachineConfig::default());
        let err = toolchain.assemble("POB nowhere").unwrap_err();
        assert_eq!(err.code(), "sema::undefined_symbol");
        assert!(err.render_frame().contains("POB nowhere"));
    }

    #[test]
    fn empty_in_both_front_ends() {
        let toolchain = Toolchain::new(MachineConfig::default());
        assert_eq!(
            toolchain.assemble("// nothing\n").unwrap_err().code(),
            "compile::empty"
        );
        assert_eq!(
            toolchain.compile_micro("\n\n").unwrap_err().code(),
            "compile::empty"
        );
    }

    #[test]
    fn custom_command_merges_over_standard() {
        let commands = Toolchain::commands_from_json(
            r#"[{"name": "dwa", "args": 0, "lines": ["czyt wei il", "wyak weja dod weak wyl wea"]},
                {"name": "BUF", "args_min": 0, "args_max": 4, "kind": "memory"}]"#,
        )
        .unwrap();
        let toolchain = Toolchain::new(MachineConfig::default())
            .with_commands(&commands)
            .unwrap();
        assert_eq!(toolchain.registry().get("DWA").unwrap().kind, Kind::Exec);
        assert!(toolchain.registry().contains("POB"));

        let compiled = toolchain.assemble("POB x\nDWA\nSTP\nx: RST 3").unwrap();
        let mut store = compiled.into_store(MachineConfig::default()).unwrap();
        while !store.halted {
            crate::runtime::apply_phase(&mut store).unwrap();
        }
        assert_eq!(store.regs.ak, 6);
    }

    #[test]
    fn gated_instruction_needs_feature() {
        let toolchain = Toolchain::new(MachineConfig::default());
        let err = toolchain.assemble("WST\nSTP").unwrap_err();
        assert_eq!(err.code(), "gen::bad_template");

        let config = MachineConfig {
            features: Features::all(),
            ..Default::default()
        };
        assert!(Toolchain::new(config).assemble("WST\nSTP").is_ok());
    }

    #[test]
    fn repeated_custom_command_is_rejected() {
        let commands = Toolchain::commands_from_json(
            r#"[{"name": "DWA", "args": 0, "lines": ["czyt wei il", "stop"]},
                {"name": "dwa", "args": 1, "lines": ["czyt wei il", "stop"]}]"#,
        )
        .unwrap();
        let err = Toolchain::new(MachineConfig::default())
            .with_commands(&commands)
            .unwrap_err();
        assert_eq!(err.code(), "registry::duplicate");
        assert!(err.message().contains("DWA"));

        // Overriding a standard mnemonic once is fine
        let commands = Toolchain::commands_from_json(r#"[{"name": "pob", "args": 1}]"#).unwrap();
        assert!(Toolchain::new(MachineConfig::default())
            .with_commands(&commands)
            .is_ok());
    }

    #[test]
    fn bad_table_json() {
        let err = Toolchain::commands_from_json("{").unwrap_err();
        assert_eq!(err.code(), "registry::json");
    }
}
