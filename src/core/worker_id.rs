//! Worker identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a miner, allocated from a small pool starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Create a new worker id
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the inner value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Value stored in a block's `relayed_by` field
    pub fn as_relayer(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id() {
        let id = WorkerId::new(3);
        assert_eq!(id.value(), 3);
        assert_eq!(id.as_relayer(), 3);
        assert_eq!(id.to_string(), "3");
        assert_eq!(WorkerId::from(3), id);
    }
}
