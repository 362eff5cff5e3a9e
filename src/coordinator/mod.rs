//! Coordinator: owns the chain, hands out targets, arbitrates submissions
//!
//! The coordinator handles one inbound frame at a time, to completion, so
//! acceptance and target advancement are serialised. Once a block at height
//! `h` is accepted the outstanding target moves to `h + 1` and every other
//! submission for `h` fails the chain-position check.

use crate::channel::{
    ChannelName, ChannelReader, ChannelWriter, Transport, ensure_created,
};
use crate::core::{Block, Chain, Difficulty, WorkerId};
use crate::error::Result;
use crate::protocol::{BlockCodec, Inbound, Message, MessageCodec, SubscribeRequest};
use crate::utils::current_timestamp;
use futures::{SinkExt, Stream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

mod validation;

pub use validation::{Rejection, validate};

/// Outbound handle to one miner
type Subscriber = FramedWrite<ChannelWriter, BlockCodec>;

/// Inbound frame stream of the coordinator
pub type InboundStream = FramedRead<ChannelReader, MessageCodec>;

/// Result of handling one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A miner was registered and sent the current target
    Subscribed(WorkerId),
    /// A subscribe request could not be honoured
    SubscribeFailed {
        /// Human readable cause
        reason: String,
    },
    /// A block was appended and the new target broadcast
    Accepted(Block),
    /// A submitted block was discarded
    Rejected(Rejection),
    /// Unrecognised bytes were skipped
    Discarded(usize),
}

/// Event counters kept by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Successful subscriptions
    pub subscriptions: u64,
    /// Subscriptions that failed
    pub failed_subscriptions: u64,
    /// Accepted blocks
    pub accepted: u64,
    /// Rejections for insufficient difficulty
    pub rejected_bad_hash: u64,
    /// Rejections for a claimed hash that does not match
    pub rejected_mismatch: u64,
    /// Rejections for stale or wrong-chain blocks
    pub rejected_stale: u64,
    /// Bytes skipped as unrecognised
    pub discarded_bytes: u64,
}

impl CoordinatorStats {
    /// Total rejected submissions
    pub fn rejected(&self) -> u64 {
        self.rejected_bad_hash + self.rejected_mismatch + self.rejected_stale
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Subscribed(_) => self.subscriptions += 1,
            Outcome::SubscribeFailed { .. } => self.failed_subscriptions += 1,
            Outcome::Accepted(_) => self.accepted += 1,
            Outcome::Rejected(Rejection::BadHash { .. }) => self.rejected_bad_hash += 1,
            Outcome::Rejected(Rejection::HashMismatch { .. }) => self.rejected_mismatch += 1,
            Outcome::Rejected(Rejection::Stale { .. }) => self.rejected_stale += 1,
            Outcome::Discarded(n) => self.discarded_bytes += *n as u64,
        }
    }
}

/// The chain's single writer
pub struct Coordinator {
    transport: Arc<dyn Transport>,
    difficulty: Difficulty,
    chain: Chain,
    target: Block,
    subscribers: BTreeMap<WorkerId, Subscriber>,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Create a coordinator with a freshly synthesised genesis block
    pub fn new(transport: Arc<dyn Transport>, difficulty: Difficulty) -> Self {
        let genesis = Block::genesis(current_timestamp(), difficulty);
        let chain = Chain::new(genesis);
        let target = chain.next_target(difficulty);

        info!(
            "Genesis block created: {}; first target height {} difficulty {}",
            genesis, target.height, difficulty
        );

        Self {
            transport,
            difficulty,
            chain,
            target,
            subscribers: BTreeMap::new(),
            stats: CoordinatorStats::default(),
        }
    }

    /// Accepted blocks, genesis first
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Target awaiting a valid submission
    pub fn current_target(&self) -> &Block {
        &self.target
    }

    /// Difficulty fixed for this coordinator's lifetime
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Registered miners
    pub fn subscriber_ids(&self) -> Vec<WorkerId> {
        self.subscribers.keys().copied().collect()
    }

    /// Event counters
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Create (if needed) and open the coordinator's inbound channel
    pub async fn open_inbound(&self) -> Result<InboundStream> {
        let name = ChannelName::coordinator();
        ensure_created(self.transport.as_ref(), &name).await?;
        let reader = self.transport.open_reader(&name).await?;
        info!("Listening on {} ({} transport)", name, self.transport.kind());
        Ok(FramedRead::new(reader, MessageCodec::new()))
    }

    /// Serve inbound frames until the stream ends
    ///
    /// Every handled frame is reported on `outcomes` when given. Rejected
    /// submissions never stop the loop; only a failing inbound read does.
    pub async fn run<S>(
        &mut self,
        mut inbound: S,
        outcomes: Option<mpsc::UnboundedSender<Outcome>>,
    ) -> Result<()>
    where
        S: Stream<Item = Result<Inbound>> + Unpin,
    {
        while let Some(frame) = inbound.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to read inbound channel: {}", e);
                    return Err(e);
                }
            };

            let outcome = self.handle(frame).await;
            if let Some(tx) = &outcomes {
                // Ignore if receiver dropped
                let _ = tx.send(outcome);
            }
        }

        info!("Inbound channel closed, coordinator stopping");
        Ok(())
    }

    /// Handle one inbound frame to completion
    pub async fn handle(&mut self, frame: Inbound) -> Outcome {
        let outcome = match frame {
            Inbound::Message(Message::Subscribe(request)) => self.on_subscribe(request).await,
            Inbound::Message(Message::Submit(candidate)) => self.on_submission(candidate).await,
            Inbound::Discarded(count) => {
                debug!("Ignored {} unrecognised bytes on inbound channel", count);
                Outcome::Discarded(count)
            }
        };

        self.stats.record(&outcome);
        debug!(
            chain_length = self.chain.len(),
            subscribers = self.subscribers.len(),
            accepted = self.stats.accepted,
            rejected = self.stats.rejected(),
            "Coordinator state"
        );
        outcome
    }

    async fn on_subscribe(&mut self, request: SubscribeRequest) -> Outcome {
        let id = match request.worker_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("Ignoring subscribe request: {}", e);
                return Outcome::SubscribeFailed {
                    reason: e.to_string(),
                };
            }
        };

        let name = ChannelName::worker(id);
        let writer = match self.transport.open_writer(&name).await {
            Ok(writer) => writer,
            Err(e) => {
                error!("Error opening miner #{} pipe: {}", id, e);
                return Outcome::SubscribeFailed {
                    reason: e.to_string(),
                };
            }
        };

        let mut subscriber = FramedWrite::new(writer, BlockCodec::new());
        if let Err(e) = subscriber.send(self.target).await {
            error!("Failed to send current target to miner #{}: {}", id, e);
            return Outcome::SubscribeFailed {
                reason: e.to_string(),
            };
        }

        if self.subscribers.insert(id, subscriber).is_some() {
            info!("Miner #{} re-subscribed, replacing its previous pipe", id);
        }
        info!(
            "Received connection request from miner #{}, pipe name: {}",
            id, name
        );
        Outcome::Subscribed(id)
    }

    async fn on_submission(&mut self, candidate: Block) -> Outcome {
        if let Err(rejection) =
            validate(&candidate, self.chain.head(), &self.target, self.difficulty)
        {
            warn!("Rejected block ({}): {}", rejection.reason(), rejection);
            return Outcome::Rejected(rejection);
        }

        info!(
            "New block added by {}, attributes: height({}), timestamp({}), hash(0x{:x}), prev_hash(0x{:x}), difficulty({}), nonce({})",
            candidate.relayed_by,
            candidate.height,
            candidate.timestamp,
            candidate.hash,
            candidate.prev_hash,
            self.difficulty,
            candidate.nonce
        );

        self.chain.push(candidate);
        self.target = self.chain.next_target(self.difficulty);
        self.broadcast().await;

        Outcome::Accepted(candidate)
    }

    /// Send the current target to every subscriber, the winner included
    async fn broadcast(&mut self) {
        let target = self.target;
        for (id, subscriber) in self.subscribers.iter_mut() {
            if let Err(e) = subscriber.send(target).await {
                warn!("Failed to send target {} to miner #{}: {}", target.height, id, e);
            }
        }
        debug!(
            "Broadcast target height {} to {} miners",
            target.height,
            self.subscribers.len()
        );
    }
}
