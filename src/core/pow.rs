//! Checksum and difficulty rules of the proof-of-work

use super::Block;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Required count of leading zero bits, 0 through 31
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u8);

impl Difficulty {
    /// Highest configurable difficulty
    pub const MAX: u32 = 31;

    /// Difficulty used when no valid configuration is available
    pub const DEFAULT: Difficulty = Difficulty(16);

    /// Create a difficulty, rejecting values above [`Difficulty::MAX`]
    pub fn new(bits: u32) -> Result<Self> {
        if bits > Self::MAX {
            return Err(Error::config(format!(
                "Difficulty must be between 0 and {}, got {}",
                Self::MAX,
                bits
            )));
        }
        Ok(Self(bits as u8))
    }

    /// Number of leading zero bits required
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<Difficulty> for u32 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.bits()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CRC-32 over height, timestamp, prev_hash, nonce and relayed_by, in that
/// order. `hash` and `difficulty` never contribute.
pub fn checksum(block: &Block) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&block.height.to_le_bytes());
    hasher.update(&block.timestamp.to_le_bytes());
    hasher.update(&block.prev_hash.to_le_bytes());
    hasher.update(&block.nonce.to_le_bytes());
    hasher.update(&block.relayed_by.to_le_bytes());
    hasher.finalize()
}

/// Count of zero bits before the most significant set bit
pub fn leading_zero_bits(value: u32) -> u32 {
    value.leading_zeros()
}

/// True iff `checksum` has at least `required` leading zero bits
pub fn meets_difficulty(checksum: u32, required: u32) -> bool {
    leading_zero_bits(checksum) >= required
}
