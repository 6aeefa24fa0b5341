//! Destination connection: handle and session task.
//!
//! # Session task
//!
//! ```text
//!            ┌──────────── frames (mpsc, depth = destination_queue_depth) ◄── registry.broadcast
//!            ▼
//!   write_all to socket ──err──▶ DestinationWriteFailed (once), later frames discarded
//!
//!   read into scratch ──EOF/err──▶ DestinationClosed, task ends
//!                    └─ data ────▶ discarded, keep reading
//! ```
//!
//! Destinations are not expected to send anything.  The pending read exists
//! only to notice when the peer goes away; any bytes it returns are thrown
//! away so a chatty peer neither looks disconnected nor spins the task.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::application::dispatch::DispatchEvent;
use crate::application::reaper::{classify_probe, Liveness};
use crate::application::registry::{FrameSink, PeerHandle, SendFrameError};
use crate::domain::connection_id::ConnectionId;

use super::TcpDispatchEvent;

/// Size of the buffer unsolicited destination bytes are read into.
const PROBE_BUFFER_SIZE: usize = 512;

/// Registry handle for one destination connection.
///
/// Frames are queued with `try_send`; the session task writes them in order.
/// Dropping the handle stops the task, which closes the socket.
#[derive(Debug)]
pub struct TcpDestination {
    id: ConnectionId,
    peer: SocketAddr,
    frames: mpsc::Sender<Bytes>,
    _close: oneshot::Sender<()>,
}

impl PeerHandle for TcpDestination {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(self) {
        drop(self);
    }
}

impl FrameSink for TcpDestination {
    fn send_frame(&self, frame: Bytes) -> Result<(), SendFrameError> {
        self.frames.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFrameError::QueueFull,
            TrySendError::Closed(_) => SendFrameError::Closed,
        })
    }
}

/// Announces a freshly accepted destination to the dispatcher, then spawns
/// its session task.
///
/// Announcing from the caller keeps admissions in accept order, so slots are
/// handed out in the order connections arrived.  Returns `false` if the
/// dispatcher is gone; the connection is then dropped.
pub async fn spawn_destination(
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    queue_depth: usize,
    tx: mpsc::Sender<TcpDispatchEvent>,
) -> bool {
    let (frames_tx, frames_rx) = mpsc::channel(queue_depth);
    let (close_tx, close_rx) = oneshot::channel();
    let handle = TcpDestination {
        id,
        peer,
        frames: frames_tx,
        _close: close_tx,
    };
    if tx
        .send(DispatchEvent::DestinationConnected(handle))
        .await
        .is_err()
    {
        return false;
    }
    tokio::spawn(run_destination(id, stream, frames_rx, close_rx, tx));
    true
}

async fn run_destination(
    id: ConnectionId,
    stream: TcpStream,
    mut frames: mpsc::Receiver<Bytes>,
    mut close_rx: oneshot::Receiver<()>,
    tx: mpsc::Sender<TcpDispatchEvent>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut scratch = [0u8; PROBE_BUFFER_SIZE];
    let mut write_failed = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut close_rx => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if write_failed {
                    continue;
                }
                if let Err(error) = writer.write_all(&frame).await {
                    write_failed = true;
                    let failed = DispatchEvent::DestinationWriteFailed { id, error };
                    if tx.send(failed).await.is_err() {
                        break;
                    }
                }
            }
            probe = reader.read(&mut scratch) => {
                if classify_probe(&probe) == Liveness::Disconnected {
                    let closed = DispatchEvent::DestinationClosed { id, error: probe.err() };
                    let _ = tx.send(closed).await;
                    break;
                }
            }
        }
    }

    debug!(%id, "destination task finished");
}
