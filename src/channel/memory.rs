//! In-process channels
//!
//! Each named channel is an unbounded queue of byte chunks with one reader
//! and any number of writers, preserving write order.

use super::{ChannelName, ChannelReader, ChannelWriter, Transport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

struct Slot {
    sender: mpsc::UnboundedSender<Bytes>,
    receiver: Option<mpsc::UnboundedReceiver<Bytes>>,
}

/// Transport whose channels live in the current process
#[derive(Clone, Default)]
pub struct MemoryTransport {
    channels: Arc<DashMap<ChannelName, Slot>>,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of existing channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("channels", &self.channels.len())
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, name: &ChannelName) -> Result<()> {
        match self.channels.entry(name.clone()) {
            Entry::Occupied(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("channel {} already exists", name),
            )
            .into()),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = mpsc::unbounded_channel();
                vacant.insert(Slot {
                    sender,
                    receiver: Some(receiver),
                });
                Ok(())
            }
        }
    }

    async fn open_reader(&self, name: &ChannelName) -> Result<ChannelReader> {
        let mut slot = self
            .channels
            .get_mut(name)
            .ok_or_else(|| Error::channel(format!("Channel {} does not exist", name)))?;
        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| Error::channel(format!("Channel {} already has a reader", name)))?;

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|chunk| (Ok::<_, io::Error>(chunk), receiver))
        });
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn open_writer(&self, name: &ChannelName) -> Result<ChannelWriter> {
        let slot = self
            .channels
            .get(name)
            .ok_or_else(|| Error::channel(format!("Channel {} does not exist", name)))?;
        if slot.sender.is_closed() {
            return Err(Error::channel(format!("Channel {} has no reader", name)));
        }
        Ok(Box::new(MemoryWriter {
            sender: slot.sender.clone(),
        }))
    }

    async fn exists(&self, name: &ChannelName) -> bool {
        self.channels.contains_key(name)
    }

    async fn remove(&self, name: &ChannelName) -> Result<()> {
        self.channels
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::channel(format!("Channel {} does not exist", name)))
    }
}

/// Writing end of an in-process channel
struct MemoryWriter {
    sender: mpsc::UnboundedSender<Bytes>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.sender.send(Bytes::copy_from_slice(buf)) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel reader is gone",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
