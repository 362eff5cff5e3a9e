//! Named, unidirectional byte channels between the coordinator and miners
//!
//! A [`Transport`] creates and opens channels by name. The coordinator owns
//! one inbound channel that every miner writes to; each miner owns one
//! inbound channel that only the coordinator writes to.

use crate::core::WorkerId;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub mod memory;

#[cfg(unix)]
pub mod fifo;

#[cfg(unix)]
pub use fifo::FifoTransport;
pub use memory::MemoryTransport;

/// Reading end of a channel
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writing end of a channel
pub type ChannelWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Well-known name of a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Name of the coordinator's inbound channel
    pub const COORDINATOR: &'static str = "server_pipe";

    /// Prefix of every miner's inbound channel
    pub const WORKER_PREFIX: &'static str = "miner_pipe_";

    /// Create a channel name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The coordinator's inbound channel
    pub fn coordinator() -> Self {
        Self::new(Self::COORDINATOR)
    }

    /// The inbound channel of the given miner
    pub fn worker(id: WorkerId) -> Self {
        Self(format!("{}{}", Self::WORKER_PREFIX, id))
    }

    /// Name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and opens named channels
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logging
    fn kind(&self) -> &'static str;

    /// Create a channel; fails with [`io::ErrorKind::AlreadyExists`] if present
    async fn create(&self, name: &ChannelName) -> Result<()>;

    /// Open the reading end of an existing channel
    async fn open_reader(&self, name: &ChannelName) -> Result<ChannelReader>;

    /// Open a writing end; fails when the channel has no reader
    async fn open_writer(&self, name: &ChannelName) -> Result<ChannelWriter>;

    /// Whether a channel with this name exists
    async fn exists(&self, name: &ChannelName) -> bool;

    /// Remove a channel so its name can be created again
    async fn remove(&self, name: &ChannelName) -> Result<()>;
}

/// Whether an error reports that a channel already exists
pub fn is_already_exists(err: &Error) -> bool {
    matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::AlreadyExists)
}

/// Create a channel unless it already exists
pub async fn ensure_created(transport: &dyn Transport, name: &ChannelName) -> Result<()> {
    match transport.create(name).await {
        Err(e) if is_already_exists(&e) => {
            debug!("Channel {} already exists, reusing it", name);
            Ok(())
        }
        other => other,
    }
}

/// Claim the lowest free worker id in `1..=pool_size`
///
/// Claiming creates the miner's inbound channel, so an id is taken exactly
/// when its channel exists.
pub async fn claim_worker_id(transport: &dyn Transport, pool_size: u32) -> Result<WorkerId> {
    for value in 1..=pool_size {
        let id = WorkerId::new(value);
        match transport.create(&ChannelName::worker(id)).await {
            Ok(()) => {
                debug!("Claimed worker id {} on {} transport", id, transport.kind());
                return Ok(id);
            }
            Err(e) if is_already_exists(&e) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(Error::IdentifiersExhausted { pool_size })
}
