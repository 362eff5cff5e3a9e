//! Named pipes in a shared directory

use super::{ChannelName, ChannelReader, ChannelWriter, Transport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tokio::net::unix::pipe;
use tracing::debug;

/// Permission bits for newly created pipes
const FIFO_MODE: libc::mode_t = 0o666;

/// Transport backed by FIFOs under a root directory
#[derive(Debug, Clone)]
pub struct FifoTransport {
    root: PathBuf,
}

impl FifoTransport {
    /// Create a transport rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the pipes
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a channel
    pub fn path(&self, name: &ChannelName) -> PathBuf {
        self.root.join(name.as_str())
    }
}

#[allow(unsafe_code)]
fn mkfifo(path: &Path, mode: libc::mode_t) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;

    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[async_trait]
impl Transport for FifoTransport {
    fn kind(&self) -> &'static str {
        "fifo"
    }

    async fn create(&self, name: &ChannelName) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path(name);
        mkfifo(&path, FIFO_MODE)?;
        debug!("Created pipe {}", path.display());
        Ok(())
    }

    async fn open_reader(&self, name: &ChannelName) -> Result<ChannelReader> {
        let path = self.path(name);
        let mut options = pipe::OpenOptions::new();
        // Holding a write end ourselves keeps the reader from seeing EOF
        // whenever the last peer closes.
        #[cfg(target_os = "linux")]
        options.read_write(true);

        let receiver = options
            .open_receiver(&path)
            .map_err(|e| Error::channel(format!("Failed to open {} for reading: {}", path.display(), e)))?;
        Ok(Box::new(receiver))
    }

    async fn open_writer(&self, name: &ChannelName) -> Result<ChannelWriter> {
        let path = self.path(name);
        let sender = pipe::OpenOptions::new()
            .open_sender(&path)
            .map_err(|e| Error::channel(format!("Failed to open {} for writing: {}", path.display(), e)))?;
        Ok(Box::new(sender))
    }

    async fn exists(&self, name: &ChannelName) -> bool {
        tokio::fs::try_exists(self.path(name)).await.unwrap_or(false)
    }

    async fn remove(&self, name: &ChannelName) -> Result<()> {
        tokio::fs::remove_file(self.path(name)).await?;
        Ok(())
    }
}
