//! Append-only chain owned by the coordinator

use super::{Block, Difficulty};

/// Ordered log of accepted blocks, genesis first
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Start a chain from its genesis block
    pub fn new(genesis: Block) -> Self {
        Self {
            blocks: vec![genesis],
        }
    }

    /// Most recently accepted block
    pub fn head(&self) -> &Block {
        // A chain always holds at least its genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chain holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append an accepted block
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Target extending the current head
    pub fn next_target(&self, difficulty: Difficulty) -> Block {
        Block::target(self.blocks.len() as i32, self.head().hash, difficulty)
    }
}
