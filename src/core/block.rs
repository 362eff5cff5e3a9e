//! Block record used both as chain entry and as wire message

use super::constants::{BLOCK_SIZE, GENESIS_HASH, GENESIS_RELAYER};
use super::pow::Difficulty;
use bytes::{Buf, BufMut};
use std::fmt;

/// A block of the chain, or a mining target when only `height`,
/// `prev_hash` and `difficulty` are filled in.
///
/// Encoded on the wire as seven little-endian 4-byte fields in declaration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    /// Position in the chain, 0 for genesis
    pub height: i32,
    /// Seconds since the Unix epoch at the time the nonce was tried
    pub timestamp: i32,
    /// Checksum claimed for this block
    pub hash: u32,
    /// Hash of the block this one extends
    pub prev_hash: u32,
    /// Required number of leading zero bits in `hash`
    pub difficulty: i32,
    /// Value varied by miners to change `hash`
    pub nonce: i32,
    /// Identifier of the miner that produced the block (-1 for genesis)
    pub relayed_by: i32,
}

impl Block {
    /// Create the genesis block
    pub fn genesis(timestamp: i32, difficulty: Difficulty) -> Self {
        Self {
            height: 0,
            timestamp,
            hash: GENESIS_HASH,
            prev_hash: 0,
            difficulty: difficulty.bits() as i32,
            nonce: 0,
            relayed_by: GENESIS_RELAYER,
        }
    }

    /// Create a mining target; hash, nonce, timestamp and relayer stay unset
    pub fn target(height: i32, prev_hash: u32, difficulty: Difficulty) -> Self {
        Self {
            height,
            prev_hash,
            difficulty: difficulty.bits() as i32,
            ..Self::default()
        }
    }

    /// Number of leading zero bits this block's difficulty demands
    ///
    /// Negative wire values demand nothing; values above 32 are capped, which
    /// still leaves them unsatisfiable for any non-zero hash.
    pub fn required_zero_bits(&self) -> u32 {
        self.difficulty.clamp(0, 32) as u32
    }

    /// Append the wire encoding to `dst`
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32_le(self.height);
        dst.put_i32_le(self.timestamp);
        dst.put_u32_le(self.hash);
        dst.put_u32_le(self.prev_hash);
        dst.put_i32_le(self.difficulty);
        dst.put_i32_le(self.nonce);
        dst.put_i32_le(self.relayed_by);
    }

    /// Read one block from `src`
    ///
    /// The caller guarantees at least [`BLOCK_SIZE`] bytes are available.
    pub fn decode<B: Buf>(src: &mut B) -> Self {
        Self {
            height: src.get_i32_le(),
            timestamp: src.get_i32_le(),
            hash: src.get_u32_le(),
            prev_hash: src.get_u32_le(),
            difficulty: src.get_i32_le(),
            nonce: src.get_i32_le(),
            relayed_by: src.get_i32_le(),
        }
    }

    /// Encode into a fixed-size array
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut bytes = [0u8; BLOCK_SIZE];
        self.encode(&mut &mut bytes[..]);
        bytes
    }

    /// Decode from a fixed-size array
    pub fn from_bytes(bytes: &[u8; BLOCK_SIZE]) -> Self {
        Self::decode(&mut &bytes[..])
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relayed_by({}), height({}), timestamp({}), hash(0x{:x}), prev_hash(0x{:x}), difficulty({}), nonce({})",
            self.relayed_by,
            self.height,
            self.timestamp,
            self.hash,
            self.prev_hash,
            self.difficulty,
            self.nonce
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis() {
        let genesis = Block::genesis(1_700_000_000, Difficulty::DEFAULT);
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.prev_hash, 0);
        assert_eq!(genesis.hash, GENESIS_HASH);
        assert_eq!(genesis.relayed_by, -1);
        assert_eq!(genesis.difficulty, 16);
    }

    #[test]
    fn test_target_leaves_mined_fields_unset() {
        let target = Block::target(3, 0xdead_beef, Difficulty::new(5).unwrap());
        assert_eq!(target.height, 3);
        assert_eq!(target.prev_hash, 0xdead_beef);
        assert_eq!(target.difficulty, 5);
        assert_eq!(target.hash, 0);
        assert_eq!(target.nonce, 0);
        assert_eq!(target.timestamp, 0);
        assert_eq!(target.relayed_by, 0);
    }

    #[test]
    fn test_wire_layout() {
        let block = Block {
            height: 1,
            timestamp: 2,
            hash: 3,
            prev_hash: 4,
            difficulty: 5,
            nonce: 6,
            relayed_by: -1,
        };
        let bytes = block.to_bytes();

        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[3, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[5, 0, 0, 0]);
        assert_eq!(&bytes[24..28], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(Block::from_bytes(&bytes), block);
    }

    #[test]
    fn test_required_zero_bits_clamps() {
        let mut block = Block::default();
        block.difficulty = -3;
        assert_eq!(block.required_zero_bits(), 0);
        block.difficulty = 12;
        assert_eq!(block.required_zero_bits(), 12);
        block.difficulty = 99;
        assert_eq!(block.required_zero_bits(), 32);
    }

    #[test]
    fn test_display() {
        let block = Block::target(1, 0xaaaa_aaaa, Difficulty::new(1).unwrap());
        let text = block.to_string();
        assert!(text.contains("height(1)"));
        assert!(text.contains("prev_hash(0xaaaaaaaa)"));
    }
}
