use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

/// Where debugger commands come from.
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
}

/// Commands given on the command line.
#[derive(Debug)]
pub struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Standard input, either piped or interactive.
#[derive(Debug)]
pub struct Stdin {
    /// Commands left over from a line holding several
    pending: VecDeque<String>,
    interactive: bool,
    buffer: String,
}

pub trait SourceReader {
    /// `None` indicates EOF
    /// Returned string slice MAY include leading or trailing whitespace
    fn read(&mut self) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        match argument {
            Some(argument) => SourceMode::Argument(Argument::from(argument)),
            None => SourceMode::Stdin(Stdin::new()),
        }
    }

    fn echoes(&self) -> bool {
        match self {
            Self::Argument(_) => true,
            Self::Stdin(stdin) => !stdin.interactive,
        }
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self) -> Option<&str> {
        let echo = self.echoes();
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
        };
        // Interactive users already see what they typed
        if echo {
            if let Some(command) = &command {
                dprintln!(Always, "\x1b[1mCommand");
                dprintln!(Always, "{}", command.trim());
            }
        }
        command
    }
}

impl From<String> for Argument {
    fn from(buffer: String) -> Self {
        Self { buffer, cursor: 0 }
    }
}

impl SourceReader for Argument {
    fn read(&mut self) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        let start = self.cursor;
        let end = self.buffer[start..]
            .find(['\n', ';'])
            .map_or(self.buffer.len(), |offset| start + offset);
        self.cursor = end + 1; // sizeof('\n' or ';')

        self.buffer.get(start..end)
    }
}

impl Stdin {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            interactive: io::stdin().is_terminal(),
            buffer: String::new(),
        }
    }

    fn prompt(&self) {
        if self.interactive {
            eprint!("\x1b[1;35m(wmach)\x1b[0m ");
            let _ = io::stderr().flush();
        }
    }
}

impl Default for Stdin {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for Stdin {
    fn read(&mut self) -> Option<&str> {
        while self.pending.is_empty() {
            self.prompt();
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self.pending.extend(line.split(';').map(str::to_string)),
            }
        }
        self.buffer = self.pending.pop_front()?;
        Some(&self.buffer)
    }
}
