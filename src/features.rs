use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Optional groups of datapath signals. The base W machine is always available.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Extended ALU: multiply, divide, shifts, logic, increment/decrement
    pub alu: bool,
    /// Data stack and subroutine calls
    pub stack: bool,
    /// Input/output queues
    pub io: bool,
    /// Interrupt enable and mask
    pub interrupts: bool,
}

impl Features {
    pub fn all() -> Self {
        Features {
            alu: true,
            stack: true,
            io: true,
            interrupts: true,
        }
    }
}

impl FromStr for Features {
    type Err = String;
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let mut features = Self::default();
        for word in string.split(',').map(str::trim) {
            let value = match word {
                "" => continue,
                "all" => {
                    features = Features::all();
                    continue;
                }
                "alu" => &mut features.alu,
                "stack" => &mut features.stack,
                "io" => &mut features.io,
                "interrupts" => &mut features.interrupts,
                _ => return Err(format!("Unknown feature '{}'", word)),
            };
            if *value {
                return Err(format!("Cannot specify feature '{}' twice", word));
            }
            *value = true;
        }
        Ok(features)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = [
            ("alu", self.alu),
            ("stack", self.stack),
            ("io", self.io),
            ("interrupts", self.interrupts),
        ];
        let mut has_any_feature = false;
        for (name, value) in features {
            if !value {
                continue;
            }
            if has_any_feature {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            has_any_feature = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list() {
        let features: Features = "stack, io".parse().unwrap();
        assert!(features.stack && features.io);
        assert!(!features.alu && !features.interrupts);
        assert_eq!(features.to_string(), "stack,io");
    }

    #[test]
    fn parse_all_and_empty() {
        assert_eq!("all".parse::<Features>().unwrap(), Features::all());
        assert_eq!("".parse::<Features>().unwrap(), Features::default());
    }

    #[test]
    fn reject_unknown_and_repeated() {
        assert!("stack,stack".parse::<Features>().is_err());
        assert!("turbo".parse::<Features>().is_err());
    }
}
