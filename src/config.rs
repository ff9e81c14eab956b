use serde::{Deserialize, Serialize};

use crate::features::Features;

/// Widest word or address the machine supports.
pub const MAX_BITS: u8 = 16;

/// Geometry of the simulated machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Width of data words, accumulator and stack entries
    pub word_bits: u8,
    /// Width of addresses; memory holds `1 << addr_bits` words
    pub addr_bits: u8,
    /// Address of the handler for interrupt line 0, line `n` uses `vector_base + n`
    pub vector_base: u16,
    pub features: Features,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            word_bits: 8,
            addr_bits: 8,
            vector_base: 0xF0,
            features: Features::default(),
        }
    }
}

impl MachineConfig {
    pub fn word_mask(&self) -> u16 {
        mask(self.word_bits)
    }

    pub fn addr_mask(&self) -> u16 {
        mask(self.addr_bits)
    }

    /// Bit that marks a negative word.
    pub fn sign_bit(&self) -> u16 {
        1 << (self.word_bits.clamp(1, MAX_BITS) - 1)
    }

    pub fn memory_size(&self) -> usize {
        1 << self.addr_bits.min(MAX_BITS)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, bits) in [("word", self.word_bits), ("address", self.addr_bits)] {
            if bits == 0 || bits > MAX_BITS {
                return Err(format!(
                    "{} width must lie within 1 to {} bits, found {}",
                    name, MAX_BITS, bits
                ));
            }
        }
        if self.vector_base as usize >= self.memory_size() {
            return Err(format!(
                "Interrupt vector base 0x{:x} lies outside memory of {} words",
                self.vector_base,
                self.memory_size()
            ));
        }
        Ok(())
    }
}

fn mask(bits: u8) -> u16 {
    match bits {
        0 => 0,
        16.. => u16::MAX,
        bits => (1 << bits) - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        let config = MachineConfig::default();
        assert_eq!(config.word_mask(), 0xFF);
        assert_eq!(config.sign_bit(), 0x80);
        assert_eq!(config.memory_size(), 256);
        let wide = MachineConfig {
            word_bits: 16,
            addr_bits: 12,
            ..config
        };
        assert_eq!(wide.word_mask(), 0xFFFF);
        assert_eq!(wide.addr_mask(), 0x0FFF);
    }

    #[test]
    fn validation() {
        assert!(MachineConfig::default().validate().is_ok());
        let bad = MachineConfig {
            word_bits: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = MachineConfig {
            addr_bits: 4,
            ..Default::default()
        };
        assert!(bad.validate().unwrap_err().contains("vector base"));
    }
}
