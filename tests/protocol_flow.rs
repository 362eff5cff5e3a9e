//! End-to-end coordinator and miner flows over in-process channels

use futures::{SinkExt, StreamExt};
use mtacoin::{
    Coordinator, Error, Miner, Outcome, Rejection,
    channel::{ChannelName, ChannelReader, MemoryTransport, Transport},
    core::{Block, Difficulty, WorkerId, checksum, constants::GENESIS_HASH, meets_difficulty},
    protocol::{BlockCodec, Message, MessageCodec, SubscribeRequest},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(20);

type CoordinatorTask = JoinHandle<(Coordinator, mtacoin::Result<()>)>;

async fn start_coordinator(
    transport: Arc<MemoryTransport>,
    difficulty: u32,
) -> (CoordinatorTask, mpsc::UnboundedReceiver<Outcome>) {
    let mut coordinator = Coordinator::new(transport, Difficulty::new(difficulty).unwrap());
    let inbound = coordinator.open_inbound().await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let result = coordinator.run(inbound, Some(tx)).await;
        (coordinator, result)
    });
    (task, rx)
}

async fn next_outcome(outcomes: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    timeout(WAIT, outcomes.recv())
        .await
        .expect("timed out waiting for coordinator")
        .expect("coordinator stopped")
}

/// A hand-driven miner: owns a channel and talks raw frames
struct RawWorker {
    id: WorkerId,
    targets: FramedRead<ChannelReader, BlockCodec>,
    outbound: FramedWrite<mtacoin::channel::ChannelWriter, MessageCodec>,
}

impl RawWorker {
    async fn subscribe(transport: &MemoryTransport, id: u32) -> Self {
        let id = WorkerId::new(id);
        let name = ChannelName::worker(id);
        transport.create(&name).await.unwrap();
        let reader = transport.open_reader(&name).await.unwrap();
        let writer = transport
            .open_writer(&ChannelName::coordinator())
            .await
            .unwrap();

        let mut outbound = FramedWrite::new(writer, MessageCodec::new());
        outbound
            .send(Message::Subscribe(SubscribeRequest::new(id, &name)))
            .await
            .unwrap();

        Self {
            id,
            targets: FramedRead::new(reader, BlockCodec::new()),
            outbound,
        }
    }

    async fn next_target(&mut self) -> Block {
        timeout(WAIT, self.targets.next())
            .await
            .expect("timed out waiting for target")
            .expect("channel closed")
            .unwrap()
    }

    fn solve(&self, target: &Block) -> Block {
        let mut candidate = Block {
            relayed_by: self.id.as_relayer(),
            timestamp: 1_700_000_000,
            nonce: 0,
            ..*target
        };
        loop {
            candidate.nonce += 1;
            candidate.hash = checksum(&candidate);
            if meets_difficulty(candidate.hash, candidate.required_zero_bits()) {
                return candidate;
            }
        }
    }

    async fn submit(&mut self, block: Block) {
        self.outbound.send(Message::Submit(block)).await.unwrap();
    }
}

#[tokio::test]
async fn test_single_miner_extends_chain() {
    let transport = Arc::new(MemoryTransport::new());
    let (_task, mut outcomes) = start_coordinator(transport.clone(), 1).await;

    // Observer sees broadcasts without mining.
    let mut observer = RawWorker::subscribe(&transport, 3).await;
    assert_eq!(
        next_outcome(&mut outcomes).await,
        Outcome::Subscribed(WorkerId::new(3))
    );
    let first = observer.next_target().await;
    assert_eq!(first.height, 1);
    assert_eq!(first.prev_hash, GENESIS_HASH);
    assert_eq!(first.difficulty, 1);

    let miner = timeout(WAIT, Miner::join(transport.clone(), 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(miner.id(), WorkerId::new(1));
    assert_eq!(*miner.target(), first);
    assert_eq!(
        next_outcome(&mut outcomes).await,
        Outcome::Subscribed(WorkerId::new(1))
    );

    let cancel = CancellationToken::new();
    let mining = tokio::spawn(miner.run(cancel.clone()));

    let accepted = match next_outcome(&mut outcomes).await {
        Outcome::Accepted(block) => block,
        other => panic!("expected acceptance, got {:?}", other),
    };
    assert_eq!(accepted.height, 1);
    assert_eq!(accepted.prev_hash, GENESIS_HASH);
    assert_eq!(accepted.relayed_by, 1);
    assert_eq!(accepted.hash, checksum(&accepted));
    assert!(meets_difficulty(accepted.hash, 1));

    let second = observer.next_target().await;
    assert_eq!(second.height, 2);
    assert_eq!(second.prev_hash, accepted.hash);

    cancel.cancel();
    let stats = timeout(WAIT, mining).await.unwrap().unwrap().unwrap();
    assert!(stats.submissions >= 1);
}

#[tokio::test]
async fn test_first_submission_wins() {
    let transport = Arc::new(MemoryTransport::new());
    let (task, mut outcomes) = start_coordinator(transport.clone(), 4).await;

    let mut a = RawWorker::subscribe(&transport, 1).await;
    let mut b = RawWorker::subscribe(&transport, 2).await;
    next_outcome(&mut outcomes).await;
    next_outcome(&mut outcomes).await;

    let target_a = a.next_target().await;
    let target_b = b.next_target().await;
    assert_eq!(target_a, target_b);

    let from_a = a.solve(&target_a);
    let from_b = b.solve(&target_b);

    a.submit(from_a).await;
    assert_eq!(next_outcome(&mut outcomes).await, Outcome::Accepted(from_a));

    b.submit(from_b).await;
    match next_outcome(&mut outcomes).await {
        Outcome::Rejected(Rejection::Stale {
            relayed_by,
            height,
            expected_height,
            ..
        }) => {
            assert_eq!(relayed_by, 2);
            assert_eq!(height, 1);
            assert_eq!(expected_height, 2);
        }
        other => panic!("expected stale rejection, got {:?}", other),
    }

    // Both, the winner included, get the next target.
    for worker in [&mut a, &mut b] {
        let next = worker.next_target().await;
        assert_eq!(next.height, 2);
        assert_eq!(next.prev_hash, from_a.hash);
    }

    // Stop the coordinator by closing its inbound channel.
    drop(a);
    drop(b);
    transport.remove(&ChannelName::coordinator()).await.unwrap();
    let (coordinator, result) = timeout(WAIT, task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(coordinator.chain().len(), 2);
    assert_eq!(coordinator.chain().head().hash, from_a.hash);
    assert_eq!(coordinator.stats().accepted, 1);
    assert_eq!(coordinator.stats().rejected_stale, 1);
}

#[tokio::test]
async fn test_wrong_chain_rejected_despite_valid_work() {
    let transport = Arc::new(MemoryTransport::new());
    let (_task, mut outcomes) = start_coordinator(transport.clone(), 2).await;

    let mut worker = RawWorker::subscribe(&transport, 1).await;
    next_outcome(&mut outcomes).await;
    let target = worker.next_target().await;

    let forged = Block {
        prev_hash: 0x1234_5678,
        ..target
    };
    let forged = worker.solve(&forged);
    worker.submit(forged).await;
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        Outcome::Rejected(Rejection::Stale { .. })
    ));

    let mut lying = worker.solve(&target);
    lying.hash ^= 1;
    worker.submit(lying).await;
    assert!(matches!(
        next_outcome(&mut outcomes).await,
        Outcome::Rejected(Rejection::BadHash { .. } | Rejection::HashMismatch { .. })
    ));

    // Still accepting after rejections.
    let good = worker.solve(&target);
    worker.submit(good).await;
    assert_eq!(next_outcome(&mut outcomes).await, Outcome::Accepted(good));
}

#[tokio::test]
async fn test_late_joiner_gets_live_target() {
    let transport = Arc::new(MemoryTransport::new());
    let (_task, mut outcomes) = start_coordinator(transport.clone(), 1).await;

    let mut early = RawWorker::subscribe(&transport, 2).await;
    next_outcome(&mut outcomes).await;
    let target = early.next_target().await;
    let block = early.solve(&target);
    early.submit(block).await;
    assert_eq!(next_outcome(&mut outcomes).await, Outcome::Accepted(block));

    let miner = timeout(WAIT, Miner::join(transport.clone(), 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(miner.target().height, 2);
    assert_eq!(miner.target().prev_hash, block.hash);
}

#[tokio::test]
async fn test_fifth_miner_cannot_join() {
    let transport = Arc::new(MemoryTransport::new());
    let (_task, mut outcomes) = start_coordinator(transport.clone(), 20).await;

    let mut miners = Vec::new();
    for expected in 1..=4 {
        let miner = timeout(WAIT, Miner::join(transport.clone(), 4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(miner.id(), WorkerId::new(expected));
        assert_eq!(
            next_outcome(&mut outcomes).await,
            Outcome::Subscribed(WorkerId::new(expected))
        );
        miners.push(miner);
    }

    let fifth = Miner::join(transport.clone(), 4).await;
    assert!(matches!(
        fifth,
        Err(Error::IdentifiersExhausted { pool_size: 4 })
    ));

    // The coordinator never heard from it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(outcomes.try_recv().is_err());
}

#[tokio::test]
async fn test_miner_submissions_keep_pace_with_coordinator() {
    let transport = Arc::new(MemoryTransport::new());
    let (_task, mut outcomes) = start_coordinator(transport.clone(), 1).await;

    let miner = timeout(WAIT, Miner::join(transport.clone(), 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        next_outcome(&mut outcomes).await,
        Outcome::Subscribed(miner.id())
    );

    let cancel = CancellationToken::new();
    let mining = tokio::spawn(miner.run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let stats = timeout(WAIT, mining).await.unwrap().unwrap().unwrap();

    let (mut accepted, mut rejected) = (0u64, 0u64);
    while let Ok(Some(outcome)) = timeout(Duration::from_millis(300), outcomes.recv()).await {
        match outcome {
            Outcome::Accepted(_) => accepted += 1,
            Outcome::Rejected(_) => rejected += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert!(accepted >= 1);
    // A lone miner never sends a block for a target it already solved.
    assert_eq!(rejected, 0);
    // At most the last submission can be lost when the writer is stopped.
    assert!(stats.submissions >= accepted);
    assert!(stats.submissions - accepted <= 1);
}
