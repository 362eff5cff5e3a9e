//! Miner: subscribes to the coordinator and searches for nonces
//!
//! The search runs on a blocking thread. After every attempt it polls, without
//! blocking, for a newer target and switches to it when the height changed.
//! Two I/O tasks move targets in and submissions out so the search never
//! waits on a channel.

use crate::channel::{ChannelName, Transport, claim_worker_id};
use crate::core::{Block, WorkerId, checksum, meets_difficulty};
use crate::error::{Error, Result};
use crate::protocol::{BlockCodec, Message, MessageCodec, SubscribeRequest};
use crate::utils::current_timestamp;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::{self, JoinHandle};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod stats;

pub use stats::{MinerStats, REPORT_INTERVAL};
use stats::RateReporter;

/// Capacity of the queue between the search thread and the submission writer
pub const SUBMISSION_QUEUE: usize = 1;

/// Background I/O tasks, aborted when dropped
struct IoTasks(Vec<JoinHandle<()>>);

impl Drop for IoTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// A subscribed miner holding its first target
pub struct Miner {
    id: WorkerId,
    channel: ChannelName,
    target: Block,
    targets: mpsc::UnboundedReceiver<Block>,
    submissions: mpsc::Sender<Block>,
    mining_height: Arc<AtomicI32>,
    tasks: IoTasks,
}

impl Miner {
    /// Claim an identifier, subscribe and wait for the first target
    ///
    /// Fails with [`Error::IdentifiersExhausted`] before anything is sent when
    /// the pool is full. On any later failure the claimed channel is removed.
    pub async fn join(transport: Arc<dyn Transport>, pool_size: u32) -> Result<Self> {
        let id = claim_worker_id(transport.as_ref(), pool_size).await?;
        let channel = ChannelName::worker(id);

        match Self::subscribe(transport.as_ref(), id, channel.clone()).await {
            Ok(miner) => Ok(miner),
            Err(e) => {
                if let Err(cleanup) = transport.remove(&channel).await {
                    warn!("Failed to remove {} after error: {}", channel, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn subscribe(transport: &dyn Transport, id: WorkerId, channel: ChannelName) -> Result<Self> {
        let reader = transport.open_reader(&channel).await.map_err(|e| {
            error!("Error opening miner pipe {}: {}", channel, e);
            e
        })?;
        let writer = transport
            .open_writer(&ChannelName::coordinator())
            .await
            .map_err(|e| {
                error!("Error opening server pipe: {}", e);
                e
            })?;

        let mut outbound = FramedWrite::new(writer, MessageCodec::new());
        let request = SubscribeRequest::new(id, &channel);
        info!("{}", request.text());
        outbound.send(Message::Subscribe(request)).await?;

        let mut inbound = FramedRead::new(reader, BlockCodec::new());
        let target = match inbound.next().await {
            Some(block) => block?,
            None => {
                return Err(Error::channel(format!(
                    "{} closed before the first target arrived",
                    channel
                )));
            }
        };
        info!("Miner #{} received first block: {}", id, target);

        let (targets_tx, targets) = mpsc::unbounded_channel();
        let (submissions, mut submissions_rx) = mpsc::channel::<Block>(SUBMISSION_QUEUE);
        let mining_height = Arc::new(AtomicI32::new(target.height));
        let current_height = Arc::clone(&mining_height);

        let pump = task::spawn(async move {
            while let Some(block) = inbound.next().await {
                match block {
                    Ok(block) => {
                        if targets_tx.send(block).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Miner #{} failed to read target: {}", id, e);
                        break;
                    }
                }
            }
            debug!("Miner #{} target reader stopped", id);
        });

        let submitter = task::spawn(async move {
            while let Some(block) = submissions_rx.recv().await {
                if block.height != current_height.load(Ordering::Acquire) {
                    debug!("Miner #{} dropped stale submission for height {}", id, block.height);
                    continue;
                }
                if let Err(e) = outbound.send(Message::Submit(block)).await {
                    warn!("Miner #{} failed to submit block {}: {}", id, block.height, e);
                }
            }
            debug!("Miner #{} submission writer stopped", id);
        });

        Ok(Self {
            id,
            channel,
            target,
            targets,
            submissions,
            mining_height,
            tasks: IoTasks(vec![pump, submitter]),
        })
    }

    /// Claimed identifier
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The miner's inbound channel
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Target received during the handshake
    pub fn target(&self) -> &Block {
        &self.target
    }

    /// Mine until cancelled or the coordinator's channel goes away
    pub async fn run(self, cancel: CancellationToken) -> Result<MinerStats> {
        let Self {
            id,
            target,
            targets,
            submissions,
            mining_height,
            tasks,
            ..
        } = self;

        let search = Search {
            id,
            targets,
            submissions,
            mining_height,
            submitted: false,
            cancel,
            stats: MinerStats::default(),
        };
        let result = task::spawn_blocking(move || search.run(target))
            .await
            .map_err(|e| Error::worker(format!("Mining thread failed: {}", e)))?;

        drop(tasks);
        result
    }
}

/// State owned by the blocking search thread
struct Search {
    id: WorkerId,
    targets: mpsc::UnboundedReceiver<Block>,
    submissions: mpsc::Sender<Block>,
    mining_height: Arc<AtomicI32>,
    /// A solution for the current target was already sent
    submitted: bool,
    cancel: CancellationToken,
    stats: MinerStats,
}

impl Search {
    fn run(mut self, target: Block) -> Result<MinerStats> {
        let started = Instant::now();
        let mut reporter = RateReporter::new();
        let mut candidate = self.start(target);

        while !self.cancel.is_cancelled() {
            candidate.nonce = candidate.nonce.wrapping_add(1);
            candidate.timestamp = current_timestamp();
            candidate.hash = checksum(&candidate);
            self.stats.attempts += 1;

            if meets_difficulty(candidate.hash, candidate.required_zero_bits()) {
                if self.submitted {
                    self.stats.duplicates += 1;
                } else {
                    info!("Miner #{} mined a new block: {}", self.id, candidate);
                    // Waits while the writer is behind.
                    self.submissions
                        .blocking_send(candidate)
                        .map_err(|_| Error::worker("Submission writer stopped"))?;
                    self.submitted = true;
                    self.stats.submissions += 1;
                }
            }

            if let Some(next) = self.poll_target(candidate.height)? {
                info!("Miner #{} received a new block: {}", self.id, next);
                self.stats.preemptions += 1;
                candidate = self.start(next);
            }

            reporter.tick(self.id.value(), self.stats.attempts);
        }

        self.stats.elapsed = started.elapsed();
        info!("Miner #{} stopped: {}", self.id, self.stats);
        Ok(self.stats)
    }

    /// Fresh candidate for `target`
    ///
    /// At most one solution is submitted per target.
    fn start(&mut self, target: Block) -> Block {
        self.submitted = false;
        self.mining_height.store(target.height, Ordering::Release);
        Block {
            nonce: 0,
            relayed_by: self.id.as_relayer(),
            ..target
        }
    }

    /// Latest queued target whose height differs from `height`
    fn poll_target(&mut self, height: i32) -> Result<Option<Block>> {
        let mut newer = None;
        loop {
            match self.targets.try_recv() {
                Ok(block) if block.height != height => newer = Some(block),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return Ok(newer),
                Err(TryRecvError::Disconnected) => {
                    return match newer {
                        Some(block) => Ok(Some(block)),
                        None => Err(Error::channel("Coordinator stopped sending targets")),
                    };
                }
            }
        }
    }
}
