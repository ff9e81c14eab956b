use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};

use wmach::debugger::{Console, Debugger, DebuggerOptions};
use wmach::output::Output;
use wmach::{apply_phase, render, Compiled, Features, MachineConfig, Snapshot, Store, Toolchain};

/// wmach is a complete compiler, microcode simulator & debugger for the W teaching machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` or `.mic` file to run
    path: Option<PathBuf>,

    #[command(flatten)]
    machine: MachineArgs,
}

/// Machine geometry and instruction set, shared by every subcommand.
#[derive(ClapArgs)]
struct MachineArgs {
    /// Comma-separated signal features: alu, stack, io, interrupts or all
    #[arg(long, global = true)]
    features: Option<Features>,
    /// Width of data words in bits
    #[arg(long, global = true, default_value_t = 8)]
    word_bits: u8,
    /// Width of addresses in bits
    #[arg(long, global = true, default_value_t = 8)]
    addr_bits: u8,
    /// Address of the handler for interrupt line 0
    #[arg(long, global = true, value_parser = parse_u16)]
    vector_base: Option<u16>,
    /// JSON instruction table merged over the standard one
    #[arg(long, global = true)]
    commands: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run `.asm`, `.mic` or snapshot `.json` file directly and output to terminal
    Run {
        /// File to run
        name: PathBuf,
        /// Bytes placed in the input queue before running
        #[arg(short, long)]
        input: Option<String>,
        /// Stop after this many phases
        #[arg(long)]
        max_phases: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run file with the debugger
    Debug {
        /// File to debug
        name: PathBuf,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Bytes placed in the input queue before running
        #[arg(short, long)]
        input: Option<String>,
        /// Stop `run` and `auto` after this many phases
        #[arg(long)]
        max_phases: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Write the microprogram as micro-assembly, or as a machine snapshot
    Compile {
        /// `.asm` or `.mic` file to compile
        name: PathBuf,
        /// Destination of the output file
        #[arg(short, long)]
        dest: Option<PathBuf>,
        /// Write a JSON snapshot of the loaded machine instead
        #[arg(short, long)]
        snapshot: bool,
    },
    /// Check a file without running or writing output
    Check {
        /// File to check
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    if let Err(err) = wmach::env::init() {
        bail!(err);
    }

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(wmach::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let config = machine_config(&args.machine)?;
    let toolchain = toolchain(&args.machine, config)?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&toolchain, &path, RunOptions::default());
        }
        println!("\n~ wmach v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    };

    match command {
        Command::Run {
            name,
            input,
            max_phases,
            minimal,
        } => run(
            &toolchain,
            &name,
            RunOptions {
                input,
                max_phases,
                minimal,
            },
        ),
        Command::Debug {
            name,
            command,
            input,
            max_phases,
            minimal,
        } => {
            set_minimal(minimal);
            if !Output::is_minimal() {
                file_message(Green, "Loading", &name);
            }
            let (mut store, symbols) = load(&toolchain, &name)?;
            if let Some(input) = input {
                store.push_input(input.as_bytes());
            }
            let opts = DebuggerOptions {
                command,
                phase_limit: max_phases,
            };
            let mut console = Console::new(Debugger::new(store), symbols, opts);
            console.run()?;
            if console.debugger().store().halted {
                message(Green, "Halted", "machine stopped");
            }
            file_message(Green, "Completed", &name);
            Ok(())
        }
        Command::Compile {
            name,
            dest,
            snapshot,
        } => {
            file_message(Green, "Compiling", &name);
            let compiled = compile(&toolchain, &name)?;
            let (contents, extension) = if snapshot {
                let store = compiled.into_store(*toolchain.config())?;
                (store.snapshot().to_json()?, "json")
            } else {
                (render(&compiled.program, &compiled.memory), "mic")
            };

            let out_file_name = match dest {
                Some(dest) => dest,
                None => PathBuf::from(name.with_extension(extension).file_name().unwrap_or_default()),
            };
            if out_file_name == name {
                bail!("Destination would overwrite the source file. Use `--dest`.");
            }
            fs::write(&out_file_name, contents).into_diagnostic()?;

            message(Green, "Finished", if snapshot { "emit snapshot" } else { "emit microcode" });
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let compiled = compile(&toolchain, &name)?;
            message(
                Green,
                "Success",
                &format!("no errors found, {} entries", compiled.program.len()),
            );
            Ok(())
        }
    }
}

fn parse_u16(value: &str) -> std::result::Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| err.to_string())
}

fn machine_config(args: &MachineArgs) -> Result<MachineConfig> {
    let defaults = MachineConfig::default();
    let config = MachineConfig {
        word_bits: args.word_bits,
        addr_bits: args.addr_bits,
        vector_base: args.vector_base.unwrap_or(defaults.vector_base),
        features: args
            .features
            .or_else(wmach::env::features)
            .unwrap_or_default(),
    };
    if let Err(err) = config.validate() {
        bail!(err);
    }
    Ok(config)
}

fn toolchain(args: &MachineArgs, config: MachineConfig) -> Result<Toolchain> {
    let toolchain = Toolchain::new(config);
    let Some(path) = &args.commands else {
        return Ok(toolchain);
    };
    let json = fs::read_to_string(path).into_diagnostic()?;
    let commands = Toolchain::commands_from_json(&json)?;
    let toolchain = toolchain.with_commands(&commands)?;
    for warning in toolchain.warnings() {
        eprintln!("{:?}", miette::Report::new(warning.clone()));
    }
    Ok(toolchain)
}

#[derive(Default)]
struct RunOptions {
    input: Option<String>,
    max_phases: Option<u64>,
    minimal: bool,
}

fn set_minimal(minimal: bool) {
    Output::set_minimal(minimal || wmach::env::is_minimal());
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(toolchain: &Toolchain, name: &Path, opts: RunOptions) -> Result<()> {
    set_minimal(opts.minimal);
    file_message(MsgColor::Green, "Loading", name);
    let (mut store, _) = load(toolchain, name)?;
    if let Some(input) = &opts.input {
        store.push_input(input.as_bytes());
    }

    message(MsgColor::Green, "Running", "microprogram");
    let mut phases: u64 = 0;
    while !store.halted {
        if opts.max_phases.is_some_and(|limit| phases >= limit) {
            flush_output(&mut store);
            message(MsgColor::Red, "Stopped", "reached phase limit");
            return Ok(());
        }
        apply_phase(&mut store)?;
        phases += 1;
        flush_output(&mut store);
    }
    Output::Normal.start_new_line();

    message(MsgColor::Green, "Halted", &format!("after {} phases", phases));
    if !Output::is_minimal() {
        Output::Debugger(wmach::output::Condition::Always).print_registers(&store);
    }
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn flush_output(store: &mut Store) {
    let bytes = store.take_output();
    if !bytes.is_empty() {
        Output::Normal.print_str(&String::from_utf8_lossy(&bytes));
    }
}

/// Compile source by extension: `.asm` assembly, `.mic` micro-assembly.
fn compile(toolchain: &Toolchain, name: &Path) -> Result<Compiled> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    let compiled = match extension(name)? {
        "asm" => toolchain.assemble(&contents)?,
        "mic" => toolchain.compile_micro(&contents)?,
        _ => bail!("File has unknown extension. Exiting..."),
    };
    Ok(compiled)
}

/// Machine ready to run, from source or from a `.json` snapshot.
fn load(toolchain: &Toolchain, name: &Path) -> Result<(Store, wmach::SymbolTable)> {
    if extension(name)? == "json" {
        let json = fs::read_to_string(name).into_diagnostic()?;
        let store = Store::restore(Snapshot::from_json(&json)?)?;
        return Ok((store, wmach::SymbolTable::new()));
    }
    let compiled = compile(toolchain, name)?;
    let symbols = compiled.symbols.clone();
    let store = compiled.into_store(*toolchain.config())?;
    Ok((store, symbols))
}

fn extension(name: &Path) -> Result<&str> {
    let Some(ext) = name.extension() else {
        bail!("File has no extension. Exiting...");
    };
    match ext.to_str() {
        Some(ext) => Ok(ext),
        None => bail!("File has unknown extension. Exiting..."),
    }
}

const LOGO: &str = r#"
 __      __
 \ \    / /  _ __ ___   __ _  ___| |__
  \ \/\/ /  | '_ ` _ \ / _` |/ __| '_ \
   \_/\_/   |_| |_| |_|\__,_|\___|_| |_|"#;

const SHORT_INFO: &str = r"
Welcome to wmach, an all-in-one toolchain for the W teaching machine:
assembler, micro-assembler, microcode simulator and debugger.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
