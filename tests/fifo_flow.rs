//! Coordinator and miner over named pipes

#![cfg(target_os = "linux")]

use mtacoin::{
    Coordinator, Error, Miner, Outcome,
    channel::{ChannelName, FifoTransport, Transport},
    core::{Difficulty, WorkerId, checksum, constants::GENESIS_HASH},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(20);

async fn next_outcome(outcomes: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    timeout(WAIT, outcomes.recv())
        .await
        .expect("timed out waiting for coordinator")
        .expect("coordinator stopped")
}

#[tokio::test]
async fn test_mining_over_named_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FifoTransport::new(dir.path()));

    let mut coordinator = Coordinator::new(transport.clone(), Difficulty::new(1).unwrap());
    let inbound = coordinator.open_inbound().await.unwrap();
    assert!(dir.path().join("server_pipe").exists());

    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let serving = tokio::spawn(async move { coordinator.run(inbound, Some(tx)).await });

    let miner = timeout(WAIT, Miner::join(transport.clone(), 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(miner.id(), WorkerId::new(1));
    assert_eq!(miner.target().height, 1);
    assert_eq!(miner.target().prev_hash, GENESIS_HASH);
    assert!(dir.path().join("miner_pipe_1").exists());
    assert_eq!(
        next_outcome(&mut outcomes).await,
        Outcome::Subscribed(WorkerId::new(1))
    );

    let channel = miner.channel().clone();
    let cancel = CancellationToken::new();
    let mining = tokio::spawn(miner.run(cancel.clone()));

    // The broadcast after each acceptance moves the miner on to the next height.
    let mut previous = GENESIS_HASH;
    for height in 1..=3 {
        match next_outcome(&mut outcomes).await {
            Outcome::Accepted(block) => {
                assert_eq!(block.height, height);
                assert_eq!(block.prev_hash, previous);
                assert_eq!(block.relayed_by, 1);
                assert_eq!(block.hash, checksum(&block));
                previous = block.hash;
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    cancel.cancel();
    let stats = timeout(WAIT, mining).await.unwrap().unwrap().unwrap();
    assert!(stats.preemptions >= 2);

    transport.remove(&channel).await.unwrap();
    assert!(!transport.exists(&channel).await);
    serving.abort();
}

#[tokio::test]
async fn test_miner_without_coordinator_releases_id() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FifoTransport::new(dir.path()));

    // The coordinator's pipe exists but nobody reads it.
    transport.create(&ChannelName::coordinator()).await.unwrap();

    let result = Miner::join(transport.clone(), 4).await;
    assert!(matches!(result, Err(Error::Channel(_))));
    assert!(!transport.exists(&ChannelName::worker(WorkerId::new(1))).await);
}
