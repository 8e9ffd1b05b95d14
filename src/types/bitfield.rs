//! BitField type for status bytes in ECU payloads

use serde::{Deserialize, Serialize};

/// A status byte whose individual bits carry engine flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField(pub u8);

impl BitField {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set. Bits past 7 are never set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 8 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `mask` is set.
    pub fn has_flag(&self, mask: u8) -> bool {
        (self.0 & mask) != 0
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}
