//! Wire protocol between miners and the coordinator
//!
//! The coordinator's inbound channel multiplexes tagged messages from every
//! miner. Each miner's inbound channel carries bare block records only.

pub mod codec;
pub mod message;

pub use codec::{BlockCodec, Inbound, MessageCodec};
pub use message::{Message, SubscribeRequest};

/// Tag prefixing a subscribe request
pub const SUBSCRIBE_TAG: &[u8; 4] = b"SUB:";

/// Tag prefixing a mined block submission
pub const BLOCK_TAG: &[u8; 4] = b"BLK:";

/// Longest accepted subscribe line, tag excluded
pub const MAX_SUBSCRIBE_LEN: usize = 256;
