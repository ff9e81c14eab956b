use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::features::Features;

/// Feature group a signal belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Group {
    Base,
    Alu,
    Stack,
    Io,
    Interrupts,
}

impl Group {
    pub fn enabled(self, features: &Features) -> bool {
        match self {
            Group::Base => true,
            Group::Alu => features.alu,
            Group::Stack => features.stack,
            Group::Io => features.io,
            Group::Interrupts => features.interrupts,
        }
    }
}

macro_rules! signals {
    ( $( $(#[$doc:meta])* $variant:ident => $name:literal, $group:ident; )* ) => {
        /// A single control line of the datapath.
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[repr(u8)]
        pub enum Signal {
            $( $(#[$doc])* $variant, )*
        }

        impl Signal {
            pub const ALL: &'static [Signal] = &[ $( Signal::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Signal::$variant => $name, )*
                }
            }

            pub fn group(self) -> Group {
                match self {
                    $( Signal::$variant => Group::$group, )*
                }
            }
        }
    };
}

signals! {
    /// S <- M[A]
    Czyt => "czyt", Base;
    /// M[A] <- S
    Pisz => "pisz", Base;
    /// I <- operand of the current instruction
    Wei => "wei", Base;
    /// L <- L + 1
    Il => "il", Base;
    /// Address bus <- L
    Wyl => "wyl", Base;
    /// L <- address bus
    Wel => "wel", Base;
    /// Address bus <- I
    Wyad => "wyad", Base;
    /// A <- address bus
    Wea => "wea", Base;
    /// Data bus <- S
    Wys => "wys", Base;
    /// S <- data bus
    Wes => "wes", Base;
    /// Data bus <- AK
    Wyak => "wyak", Base;
    /// ALU input <- data bus
    Weja => "weja", Base;
    Przep => "przep", Base;
    Dod => "dod", Base;
    Ode => "ode", Base;
    /// AK <- ALU result, updating flags
    Weak => "weak", Base;
    Stop => "stop", Base;
    Mno => "mno", Alu;
    Dziel => "dziel", Alu;
    Shl => "shl", Alu;
    Shr => "shr", Alu;
    Neg => "neg", Alu;
    Lub => "lub", Alu;
    I => "i", Alu;
    Iak => "iak", Alu;
    Dak => "dak", Alu;
    /// Data stack <- AK
    Push => "push", Stack;
    /// AK <- data stack
    Pop => "pop", Stack;
    /// Call stack <- return context
    Call => "call", Stack;
    /// Return to the context on top of the call stack
    Ret => "ret", Stack;
    /// Data bus <- next input byte
    Wyrb => "wyrb", Io;
    /// Output <- data bus
    Werb => "werb", Io;
    /// Data bus <- input ready bit
    Wyg => "wyg", Io;
    Eni => "eni", Interrupts;
    Dni => "dni", Interrupts;
    /// Interrupt mask |= data bus
    Ustm => "ustm", Interrupts;
    /// Interrupt mask &= !data bus
    Czm => "czm", Interrupts;
}

impl FromStr for Signal {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .iter()
            .copied()
            .find(|sig| sig.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of signals asserted together during one clock phase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SignalSet(u64);

impl SignalSet {
    pub const fn empty() -> Self {
        SignalSet(0)
    }

    pub fn of(signals: &[Signal]) -> Self {
        signals.iter().copied().collect()
    }

    /// Every signal enabled by `features`.
    pub fn available(features: &Features) -> Self {
        Signal::ALL
            .iter()
            .copied()
            .filter(|sig| sig.group().enabled(features))
            .collect()
    }

    pub fn insert(&mut self, sig: Signal) {
        self.0 |= 1 << sig as u8;
    }

    pub fn remove(&mut self, sig: Signal) {
        self.0 &= !(1 << sig as u8);
    }

    pub fn contains(&self, sig: Signal) -> bool {
        self.0 & (1 << sig as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(self, other: SignalSet) -> SignalSet {
        SignalSet(self.0 | other.0)
    }

    pub fn is_subset(&self, other: &SignalSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        Signal::ALL.iter().copied().filter(|sig| self.contains(*sig))
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<T: IntoIterator<Item = Signal>>(iter: T) -> Self {
        let mut set = SignalSet::empty();
        for sig in iter {
            set.insert(sig);
        }
        set
    }
}

impl FromStr for SignalSet {
    type Err = String;
    /// Whitespace-separated signal names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .map(|word| {
                word.parse::<Signal>()
                    .map_err(|_| format!("Unknown signal '{}'", word))
            })
            .collect()
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sig) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", sig)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Signal::name)).finish()
    }
}

impl Serialize for SignalSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Signal::name))
    }
}

impl<'de> Deserialize<'de> for SignalSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                name.parse::<Signal>()
                    .map_err(|_| de::Error::custom(format!("unknown signal `{name}`")))
            })
            .collect()
    }
}

/// Single-bit machine condition usable by conditional phases and jumps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Flag {
    /// Accumulator is zero
    #[serde(rename = "Z")]
    Zero,
    /// Accumulator sign bit is set
    #[serde(rename = "N")]
    Negative,
    /// Input queue holds data
    #[serde(rename = "R")]
    Ready,
}

impl Flag {
    /// Accepts canonical names and their aliases, in any case.
    pub fn parse(name: &str) -> Option<Flag> {
        match name.to_ascii_uppercase().as_str() {
            "Z" | "ZERO" => Some(Flag::Zero),
            "N" | "NEG" | "NEGATIVE" | "UJEMNY" => Some(Flag::Negative),
            "R" | "READY" => Some(Flag::Ready),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Flag::Zero => "Z",
            Flag::Negative => "N",
            Flag::Ready => "R",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_operations() {
        let mut set = SignalSet::of(&[Signal::Czyt, Signal::Wei, Signal::Il]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(Signal::Wei));
        set.remove(Signal::Wei);
        assert!(!set.contains(Signal::Wei));
        assert_eq!(set.to_string(), "czyt il");
        assert!(set.is_subset(&SignalSet::available(&Features::default())));
    }

    #[test]
    fn parse_names() {
        let set: SignalSet = "WYAD wea  czyt".parse().unwrap();
        assert_eq!(set, SignalSet::of(&[Signal::Czyt, Signal::Wyad, Signal::Wea]));
        assert!("czyt bogus".parse::<SignalSet>().is_err());
    }

    #[test]
    fn available_respects_features() {
        let base = SignalSet::available(&Features::default());
        assert!(base.contains(Signal::Dod));
        assert!(!base.contains(Signal::Push));
        let all = SignalSet::available(&Features::all());
        assert_eq!(all.len(), Signal::ALL.len());
    }

    #[test]
    fn serde_uses_names() {
        let set = SignalSet::of(&[Signal::Wys, Signal::Weja]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["wys","weja"]"#);
        assert_eq!(serde_json::from_str::<SignalSet>(&json).unwrap(), set);
        assert!(serde_json::from_str::<SignalSet>(r#"["nope"]"#).is_err());
    }

    #[test]
    fn flag_aliases() {
        assert_eq!(Flag::parse("negative"), Some(Flag::Negative));
        assert_eq!(Flag::parse("z"), Some(Flag::Zero));
        assert_eq!(Flag::parse("READY"), Some(Flag::Ready));
        assert_eq!(Flag::parse("C"), None);
    }
}
