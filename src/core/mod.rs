//! Core types for the chain and its proof-of-work
//!
//! This module contains the block record shared by the coordinator and the
//! miners, the checksum and difficulty rules, and the append-only chain.

mod block;
mod chain;
mod pow;
mod worker_id;

pub use block::Block;
pub use chain::Chain;
pub use pow::{Difficulty, checksum, leading_zero_bits, meets_difficulty};
pub use worker_id::WorkerId;

/// Constants for the wire format
pub mod constants {
    /// Width of every block field on the wire
    pub const FIELD_SIZE: usize = 4;

    /// Number of fields in a block record
    pub const FIELD_COUNT: usize = 7;

    /// Size of an encoded block in bytes
    pub const BLOCK_SIZE: usize = FIELD_SIZE * FIELD_COUNT;

    /// Size of a message tag (`SUB:` / `BLK:`)
    pub const TAG_SIZE: usize = 4;

    /// Sentinel hash carried by the genesis block
    pub const GENESIS_HASH: u32 = 0xAAAA_AAAA;

    /// `relayed_by` value of the genesis block
    pub const GENESIS_RELAYER: i32 = -1;
}
