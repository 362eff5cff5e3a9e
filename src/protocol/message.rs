//! Messages carried on the coordinator's inbound channel

use crate::channel::ChannelName;
use crate::core::{Block, WorkerId};
use crate::error::{Error, Result};

/// A message sent by a miner to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Request to receive targets
    Subscribe(SubscribeRequest),
    /// A mined block candidate
    Submit(Block),
}

/// Free-form subscribe text naming the miner as `#<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    text: String,
}

impl SubscribeRequest {
    /// Build the request a miner sends for itself
    pub fn new(worker_id: WorkerId, channel: &ChannelName) -> Self {
        Self {
            text: format!("Miner #{} sent connect request on {}", worker_id, channel),
        }
    }

    /// Wrap text received from the wire
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Raw request text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Extract the decimal identifier following the first `#`
    pub fn worker_id(&self) -> Result<WorkerId> {
        let (_, rest) = self
            .text
            .split_once('#')
            .ok_or_else(|| Error::protocol(format!("No miner id in '{}'", self.text)))?;

        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits
            .parse::<u32>()
            .map(WorkerId::new)
            .map_err(|_| Error::protocol(format!("Invalid miner id in '{}'", self.text)))
    }
}
