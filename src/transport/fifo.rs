//! Named-pipe (FIFO) transport.
//!
//! Every inbound endpoint is a FIFO node on the filesystem, created with
//! mode `0600`. The address *is* the path, so a client's reply address can
//! be handed to the server inside a request and opened there directly.
//!
//! ## Reading
//!
//! The owner opens the read end and, in the same task, a write end of its
//! own. Holding that write end means the read end never reports EOF while
//! no client happens to be writing, so the pump task can simply await the
//! next read.
//!
//! ## Writing
//!
//! `send()` opens the FIFO, writes the whole frame and closes it again.
//! Writes up to `PIPE_BUF` bytes (4096 on Linux) are atomic. Larger frames
//! from concurrent writers may interleave and will then fail to decode on
//! the reading side.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::FrameBuffer;
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    Address,
    ClaimMode,
    Listener,
    Result,
    RpcConfig,
    RpcError,
    Transport,
    TransportPtr,
};

const READ_CHUNK: usize = 4096;

/// FIFO transport.
struct FifoTransport {
    // ---
    inbox_capacity: usize,
}

/// Create a FIFO node at `path`.
fn make_fifo(path: &Path) -> io::Result<()> {
    // ---
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Stops the pump and unlinks the FIFO node when the listener is dropped.
struct Release {
    path: PathBuf,
    pump: JoinHandle<()>,
}

impl Drop for Release {
    fn drop(&mut self) {
        // ---
        self.pump.abort();
        match std::fs::remove_file(&self.path) {
            Ok(()) => log_debug!("fifo: removed {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(_err) => log_warn!("fifo: could not remove {}: {_err}", self.path.display()),
        }
    }
}

/// Read the FIFO forever, forwarding each complete frame to the inbox.
///
/// Ends when the listener side of the inbox is gone or the FIFO fails.
async fn pump(
    path: PathBuf,
    mut receiver: pipe::Receiver,
    _keepalive: pipe::Sender,
    tx: mpsc::Sender<Bytes>,
) {
    // ---
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match receiver.read(&mut chunk).await {
            Ok(0) => {
                log_warn!("fifo: unexpected EOF on {}", path.display());
                break;
            }
            Ok(n) => n,
            Err(_err) => {
                log_error!("fifo: read failed on {}: {_err}", path.display());
                break;
            }
        };

        for frame in frames.push(&chunk[..n]) {
            if tx.send(frame).await.is_err() {
                log_debug!("fifo: listener for {} dropped", path.display());
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for FifoTransport {
    // ---
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn private_address(&self, config: &RpcConfig) -> Address {
        // ---
        let name = format!("{}.{}", config.reply_prefix, Uuid::new_v4().simple());
        Address::from(config.reply_dir.join(name).to_string_lossy().into_owned())
    }

    async fn listen(&self, address: &Address, claim: ClaimMode) -> Result<Listener> {
        // ---
        let path = PathBuf::from(address.as_str());

        if claim == ClaimMode::Reclaim {
            // A stale node from an earlier run is expected; anything else
            // surfaces from mkfifo below.
            if std::fs::remove_file(&path).is_ok() {
                log_debug!("fifo: reclaimed {}", path.display());
            }
        }

        make_fifo(&path).map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => RpcError::AddressInUse(address.to_string()),
            _ => RpcError::Io(err),
        })?;

        let opened = pipe::OpenOptions::new()
            .open_receiver(&path)
            .and_then(|receiver| {
                let keepalive = pipe::OpenOptions::new().open_sender(&path)?;
                Ok((receiver, keepalive))
            });

        let (receiver, keepalive) = match opened {
            Ok(ends) => ends,
            Err(err) => {
                let _ = std::fs::remove_file(&path);
                return Err(err.into());
            }
        };

        let (tx, rx) = mpsc::channel(self.inbox_capacity);
        let pump = tokio::spawn(pump(path.clone(), receiver, keepalive, tx));

        log_debug!("fifo: listening on {}", path.display());

        Ok(Listener::new(address.clone(), rx, Release { path, pump }))
    }

    async fn send(&self, address: &Address, frame: Bytes) -> Result<()> {
        // ---
        let mut sender = pipe::OpenOptions::new().open_sender(address.as_str())?;
        sender.write_all(&frame).await?;
        Ok(())
    }
}

/// Create a FIFO transport.
///
/// The transport itself holds no endpoints; they are created by `listen()`
/// and removed when the returned listener is dropped.
pub fn create_fifo_transport(config: &RpcConfig) -> TransportPtr {
    // ---
    std::sync::Arc::new(FifoTransport {
        inbox_capacity: config.inbox_capacity.max(1),
    })
}
