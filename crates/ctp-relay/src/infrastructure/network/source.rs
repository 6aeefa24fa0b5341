//! Source connection: handle and reader task.
//!
//! [`spawn_source`] is awaited by the acceptor.  It queues `SourceConnected`
//! before the reader task exists, so announcements reach the dispatcher in
//! accept order and always ahead of that source's first read.  The reader task
//! then performs one bounded read at a time and forwards each result as a
//! `SourceReadable` notification.  The bounded dispatch channel applies
//! backpressure: the task does not read again until the previous result has
//! been queued.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::application::dispatch::DispatchEvent;
use crate::application::registry::PeerHandle;
use crate::application::relay::{CandidateReader, ReadOutcome};
use crate::domain::connection_id::ConnectionId;

use super::TcpDispatchEvent;

/// Registry handle for the source connection.
///
/// Dropping the handle stops the reader task, which closes the socket.
#[derive(Debug)]
pub struct TcpSource {
    id: ConnectionId,
    peer: SocketAddr,
    _close: oneshot::Sender<()>,
}

impl PeerHandle for TcpSource {
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

/// Announces a freshly accepted source to the dispatcher, then spawns its
/// reader task.
///
/// Returns `false` if the dispatcher is gone; the connection is then dropped.
pub async fn spawn_source(
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_size: usize,
    tx: mpsc::Sender<TcpDispatchEvent>,
) -> bool {
    let (close_tx, close_rx) = oneshot::channel();
    let handle = TcpSource {
        id,
        peer,
        _close: close_tx,
    };
    if tx.send(DispatchEvent::SourceConnected(handle)).await.is_err() {
        return false;
    }
    tokio::spawn(run_source(
        id,
        CandidateReader::new(stream, max_frame_size),
        close_rx,
        tx,
    ));
    true
}

async fn run_source(
    id: ConnectionId,
    mut reader: CandidateReader<TcpStream>,
    mut close_rx: oneshot::Receiver<()>,
    tx: mpsc::Sender<TcpDispatchEvent>,
) {
    loop {
        let outcome = tokio::select! {
            biased;
            _ = &mut close_rx => break,
            outcome = reader.next_candidate() => outcome,
        };

        let disconnected = matches!(outcome, ReadOutcome::Disconnected(_));
        if tx
            .send(DispatchEvent::SourceReadable { id, outcome })
            .await
            .is_err()
        {
            break;
        }
        if disconnected {
            break;
        }
    }

    debug!(%id, "source task finished");
}
