//! Acceptance rules for submitted blocks

use crate::core::{Block, Difficulty, checksum, meets_difficulty};
use thiserror::Error;

/// Why a submitted block was not appended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The recomputed checksum lacks the required leading zero bits
    #[error("Miner #{relayed_by} provided bad hash (0x{computed:x}) for block, {required} leading zero bits required")]
    BadHash {
        /// Submitting miner
        relayed_by: i32,
        /// Checksum recomputed by the coordinator
        computed: u32,
        /// Required leading zero bits
        required: u32,
    },

    /// The claimed hash differs from the recomputed checksum
    #[error("Miner #{relayed_by} provided hash (0x{claimed:x}) but server calculated (0x{computed:x})")]
    HashMismatch {
        /// Submitting miner
        relayed_by: i32,
        /// Hash carried by the block
        claimed: u32,
        /// Checksum recomputed by the coordinator
        computed: u32,
    },

    /// The block does not extend the head at the outstanding height
    #[error(
        "Miner #{relayed_by} provided stale block: height {height}, prev_hash (0x{prev_hash:x}); expected height {expected_height} on top of 0x{head_hash:x}"
    )]
    Stale {
        /// Submitting miner
        relayed_by: i32,
        /// Height carried by the block
        height: i32,
        /// Previous hash carried by the block
        prev_hash: u32,
        /// Height of the outstanding target
        expected_height: i32,
        /// Hash of the current chain head
        head_hash: u32,
    },
}

impl Rejection {
    /// Short reason label
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::BadHash { .. } => "bad hash",
            Rejection::HashMismatch { .. } => "hash mismatch",
            Rejection::Stale { .. } => "stale or wrong-chain submission",
        }
    }
}

/// Check a candidate against the chain head and the outstanding target
///
/// Rules apply in order: difficulty, checksum integrity, chain position.
/// Returns the recomputed checksum on success.
pub fn validate(
    candidate: &Block,
    head: &Block,
    target: &Block,
    difficulty: Difficulty,
) -> Result<u32, Rejection> {
    let computed = checksum(candidate);

    if !meets_difficulty(computed, difficulty.bits()) {
        return Err(Rejection::BadHash {
            relayed_by: candidate.relayed_by,
            computed,
            required: difficulty.bits(),
        });
    }

    if computed != candidate.hash {
        return Err(Rejection::HashMismatch {
            relayed_by: candidate.relayed_by,
            claimed: candidate.hash,
            computed,
        });
    }

    if candidate.prev_hash != head.hash || candidate.height != target.height {
        return Err(Rejection::Stale {
            relayed_by: candidate.relayed_by,
            height: candidate.height,
            prev_hash: candidate.prev_hash,
            expected_height: target.height,
            head_hash: head.hash,
        });
    }

    Ok(computed)
}
