use std::error::Error;
use std::fmt;
use std::str::SplitWhitespace;

/// Debugger console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Apply phases
    Step { count: u32 },
    /// Run whole instructions
    Next { count: u32 },
    Run,
    Continue,
    BreakList,
    BreakAdd { location: Location },
    BreakRemove { location: Location },
    Registers,
    Memory { location: Location, count: u16 },
    Input { text: String },
    Interrupt { line: u8 },
    Auto { delay_ms: Option<u64> },
    Reset,
    Log,
    Quit,
}

/// Address given as a number or label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    Address(u16),
    Label(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandName {
    Help,
    Step,
    Next,
    Run,
    Continue,
    BreakList,
    BreakAdd,
    BreakRemove,
    Registers,
    Memory,
    Input,
    Interrupt,
    Auto,
    Reset,
    Log,
    Quit,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help"),
            Self::Step => write!(f, "step"),
            Self::Next => write!(f, "next"),
            Self::Run => write!(f, "run"),
            Self::Continue => write!(f, "continue"),
            Self::BreakList => write!(f, "break list"),
            Self::BreakAdd => write!(f, "break add"),
            Self::BreakRemove => write!(f, "break remove"),
            Self::Registers => write!(f, "registers"),
            Self::Memory => write!(f, "memory"),
            Self::Input => write!(f, "input"),
            Self::Interrupt => write!(f, "irq"),
            Self::Auto => write!(f, "auto"),
            Self::Reset => write!(f, "reset"),
            Self::Log => write!(f, "log"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

/// Error parsing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    Invalid {
        command_name: String,
    },
    MissingSubcommand {
        command_name: &'static str,
    },
    InvalidSubcommand {
        command_name: &'static str,
        subcommand_name: String,
    },
    MissingArgument {
        command_name: CommandName,
        argument_name: &'static str,
    },
    InvalidArgument {
        command_name: CommandName,
        argument_name: &'static str,
        string: String,
    },
    TooManyArguments {
        command_name: CommandName,
        expected_count: u8,
    },
}

impl Error for CommandError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { command_name } => {
                write!(f, "Not a command: `{}`.", command_name)?;
                write!(f, "\n    Run `help` for a list of commands.")
            }
            Self::MissingSubcommand { command_name } => {
                write!(f, "Missing subcommand: `{} (...)`.", command_name)
            }
            Self::InvalidSubcommand {
                command_name,
                subcommand_name,
            } => write!(
                f,
                "Invalid subcommand: `{} {}`.",
                command_name, subcommand_name
            ),
            Self::MissingArgument {
                command_name,
                argument_name,
            } => write!(
                f,
                "Missing argument `{}` for command `{}`.",
                argument_name, command_name
            ),
            Self::InvalidArgument {
                command_name,
                argument_name,
                string,
            } => write!(
                f,
                "Invalid value `{}` for argument `{}` of command `{}`.",
                string, argument_name, command_name
            ),
            Self::TooManyArguments {
                command_name,
                expected_count,
            } => write!(
                f,
                "Command `{}` takes at most {} argument{}.",
                command_name,
                expected_count,
                if *expected_count == 1 { "" } else { "s" }
            ),
        }
    }
}

type Result<T> = std::result::Result<T, CommandError>;

/// Whitespace-separated arguments of one command.
struct ArgIter<'a> {
    line: &'a str,
    words: SplitWhitespace<'a>,
}

impl<'a> ArgIter<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            words: line.split_whitespace(),
        }
    }

    fn get_command_name(&mut self) -> Result<CommandName> {
        let word = self.words.next().unwrap_or("");
        let name = match word.to_ascii_lowercase().as_str() {
            "help" | "h" | "?" => CommandName::Help,
            "step" | "s" => CommandName::Step,
            "next" | "n" | "instr" => CommandName::Next,
            "run" | "r" => CommandName::Run,
            "continue" | "c" => CommandName::Continue,
            "break" | "b" => return self.get_break_subcommand(),
            "registers" | "reg" => CommandName::Registers,
            "memory" | "mem" | "m" => CommandName::Memory,
            "input" | "in" => CommandName::Input,
            "irq" | "interrupt" => CommandName::Interrupt,
            "auto" => CommandName::Auto,
            "reset" => CommandName::Reset,
            "log" => CommandName::Log,
            "quit" | "q" | "exit" => CommandName::Quit,
            _ => {
                return Err(CommandError::Invalid {
                    command_name: word.to_string(),
                })
            }
        };
        Ok(name)
    }

    fn get_break_subcommand(&mut self) -> Result<CommandName> {
        let Some(word) = self.words.next() else {
            return Err(CommandError::MissingSubcommand {
                command_name: "break",
            });
        };
        match word.to_ascii_lowercase().as_str() {
            "list" | "l" => Ok(CommandName::BreakList),
            "add" | "a" => Ok(CommandName::BreakAdd),
            "remove" | "r" | "rm" => Ok(CommandName::BreakRemove),
            _ => Err(CommandError::InvalidSubcommand {
                command_name: "break",
                subcommand_name: word.to_string(),
            }),
        }
    }

    /// Everything after a single command word, inner spacing kept.
    fn rest(&mut self, name: CommandName) -> Result<String> {
        self.words = "".split_whitespace();
        let text = self
            .line
            .trim()
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest.trim());
        if text.is_empty() {
            return Err(CommandError::MissingArgument {
                command_name: name,
                argument_name: "text",
            });
        }
        Ok(text.to_string())
    }

    fn next_integer(&mut self, name: CommandName, argument_name: &'static str) -> Result<Option<u64>> {
        let Some(word) = self.words.next() else {
            return Ok(None);
        };
        parse_integer(word)
            .map(Some)
            .ok_or_else(|| CommandError::InvalidArgument {
                command_name: name,
                argument_name,
                string: word.to_string(),
            })
    }

    fn next_bounded<T: TryFrom<u64>>(
        &mut self,
        name: CommandName,
        argument_name: &'static str,
    ) -> Result<Option<T>> {
        let Some(value) = self.next_integer(name, argument_name)? else {
            return Ok(None);
        };
        T::try_from(value)
            .map(Some)
            .map_err(|_| CommandError::InvalidArgument {
                command_name: name,
                argument_name,
                string: value.to_string(),
            })
    }

    fn next_location(&mut self, name: CommandName) -> Result<Location> {
        let Some(word) = self.words.next() else {
            return Err(CommandError::MissingArgument {
                command_name: name,
                argument_name: "location",
            });
        };
        if let Some(value) = parse_integer(word) {
            return u16::try_from(value)
                .map(Location::Address)
                .map_err(|_| CommandError::InvalidArgument {
                    command_name: name,
                    argument_name: "location",
                    string: word.to_string(),
                });
        }
        let is_label = word
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
            && word.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !is_label {
            return Err(CommandError::InvalidArgument {
                command_name: name,
                argument_name: "location",
                string: word.to_string(),
            });
        }
        Ok(Location::Label(word.to_string()))
    }

    fn required<T>(value: Option<T>, name: CommandName, argument_name: &'static str) -> Result<T> {
        value.ok_or(CommandError::MissingArgument {
            command_name: name,
            argument_name,
        })
    }

    fn expect_end(&mut self, name: CommandName, expected_count: u8) -> Result<()> {
        if self.words.next().is_some() {
            return Err(CommandError::TooManyArguments {
                command_name: name,
                expected_count,
            });
        }
        Ok(())
    }
}

/// Decimal, `0x` hexadecimal or `0b` binary.
fn parse_integer(word: &str) -> Option<u64> {
    let lower = word.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self> {
        let mut iter = ArgIter::new(line);
        let name = iter.get_command_name()?;
        let mut expected = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Run => Self::Run,
            CommandName::Continue => Self::Continue,
            CommandName::BreakList => Self::BreakList,
            CommandName::Registers => Self::Registers,
            CommandName::Reset => Self::Reset,
            CommandName::Log => Self::Log,
            CommandName::Quit => Self::Quit,

            CommandName::Step => {
                expected = 1;
                let count = iter.next_bounded(name, "count")?.unwrap_or(1);
                Self::Step { count }
            }
            CommandName::Next => {
                expected = 1;
                let count = iter.next_bounded(name, "count")?.unwrap_or(1);
                Self::Next { count }
            }
            CommandName::BreakAdd => {
                expected = 1;
                let location = iter.next_location(name)?;
                Self::BreakAdd { location }
            }
            CommandName::BreakRemove => {
                expected = 1;
                let location = iter.next_location(name)?;
                Self::BreakRemove { location }
            }
            CommandName::Memory => {
                expected = 2;
                let location = iter.next_location(name)?;
                let count = iter.next_bounded(name, "count")?.unwrap_or(1);
                Self::Memory { location, count }
            }
            CommandName::Input => {
                let text = iter.rest(name)?;
                return Ok(Self::Input { text });
            }
            CommandName::Interrupt => {
                expected = 1;
                let line = iter.next_bounded(name, "line")?;
                let line = ArgIter::required(line, name, "line")?;
                Self::Interrupt { line }
            }
            CommandName::Auto => {
                expected = 1;
                let delay_ms = match iter.words.clone().next() {
                    Some(word) if word.eq_ignore_ascii_case("off") => {
                        iter.words.next();
                        None
                    }
                    _ => {
                        let delay = iter.next_integer(name, "delay")?;
                        Some(ArgIter::required(delay, name, "delay")?)
                    }
                };
                Self::Auto { delay_ms }
            }
        };

        iter.expect_end(name, expected)?;
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::try_from("step"), Ok(Command::Step { count: 1 }));
        assert_eq!(Command::try_from("s 0x10"), Ok(Command::Step { count: 16 }));
        assert_eq!(Command::try_from("instr 2"), Ok(Command::Next { count: 2 }));
        assert_eq!(
            Command::try_from("break add loop"),
            Ok(Command::BreakAdd {
                location: Location::Label("loop".into())
            })
        );
        assert_eq!(
            Command::try_from("b rm 0b11"),
            Ok(Command::BreakRemove {
                location: Location::Address(3)
            })
        );
        assert_eq!(
            Command::try_from("mem 4 2"),
            Ok(Command::Memory {
                location: Location::Address(4),
                count: 2
            })
        );
        assert_eq!(
            Command::try_from("input  hello world "),
            Ok(Command::Input {
                text: "hello world".into()
            })
        );
        assert_eq!(Command::try_from("irq 3"), Ok(Command::Interrupt { line: 3 }));
        assert_eq!(
            Command::try_from("auto 250"),
            Ok(Command::Auto {
                delay_ms: Some(250)
            })
        );
        assert_eq!(Command::try_from("auto off"), Ok(Command::Auto { delay_ms: None }));
        assert_eq!(Command::try_from("HELP me"), Ok(Command::Help));
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!(
            Command::try_from("jump 4"),
            Err(CommandError::Invalid {
                command_name: "jump".into()
            })
        );
        assert_eq!(
            Command::try_from("break"),
            Err(CommandError::MissingSubcommand {
                command_name: "break"
            })
        );
        assert!(matches!(
            Command::try_from("break fix"),
            Err(CommandError::InvalidSubcommand { .. })
        ));
        assert!(matches!(
            Command::try_from("irq"),
            Err(CommandError::MissingArgument {
                argument_name: "line",
                ..
            })
        ));
        assert!(matches!(
            Command::try_from("irq 300"),
            Err(CommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::try_from("step 1 2"),
            Err(CommandError::TooManyArguments {
                expected_count: 1,
                ..
            })
        ));
        assert!(matches!(
            Command::try_from("break add 1abc"),
            Err(CommandError::InvalidArgument { .. })
        ));
    }
}
