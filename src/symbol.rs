use fxhash::FxBuildHasher;
use indexmap::IndexMap;

// Symbol table of symbol -> memory address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Registers that may be named as instruction operands.
pub const OPERAND_REGISTERS: &[&str] = &["AK"];

/// Label -> address mapping, kept in definition order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    table: FxMap<String, u16>,
}

/// Returned when inserting a label that already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duplicate {
    /// Address of the earlier definition
    pub previous: u16,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            table: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn insert(&mut self, name: &str, addr: u16) -> Result<(), Duplicate> {
        if let Some(previous) = self.table.get(name) {
            return Err(Duplicate {
                previous: *previous,
            });
        }
        self.table.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.table.get(name).copied()
    }

    /// First label defined at `addr`, if any.
    pub fn name_of(&self, addr: u16) -> Option<&str> {
        self.table
            .iter()
            .find(|(_, val)| **val == addr)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.table.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

pub fn is_operand_register(name: &str) -> bool {
    OPERAND_REGISTERS
        .iter()
        .any(|reg| reg.eq_ignore_ascii_case(name))
}
