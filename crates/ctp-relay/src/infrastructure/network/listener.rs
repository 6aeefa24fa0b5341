//! RelayServer: listeners, acceptor tasks, and the dispatch loop.
//!
//! ```text
//! RelayServer::run
//!  ├─ accept_sources       (task)  source listener  ─► spawn_source
//!  ├─ accept_destinations  (task)  dest listener    ─► spawn_destination
//!  └─ Dispatcher::run      (this task)
//! ```
//!
//! Binding happens in [`RelayServer::bind`] so that a port already in use is
//! reported before anything else starts.  Accept failures after that are
//! logged and the acceptor keeps going.  Each acceptor awaits the
//! announcement of one connection before accepting the next, so the
//! dispatcher sees connections of one kind in the order they were accepted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::dispatch::Dispatcher;
use crate::domain::config::{LimitsConfig, RelayConfig};
use crate::domain::connection_id::ConnectionIdAllocator;
use crate::domain::events::EventSink;

use super::destination::spawn_destination;
use super::source::spawn_source;
use super::{NetworkError, TcpDispatchEvent, DISPATCH_CHANNEL_CAPACITY};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the acceptor.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Both relay listeners, bound and ready to serve.
pub struct RelayServer {
    source_listener: TcpListener,
    destination_listener: TcpListener,
    limits: LimitsConfig,
}

impl RelayServer {
    /// Binds the source and destination listeners.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Config`] if the bind address is invalid, or
    /// [`NetworkError::BindFailed`] if either port cannot be bound.
    pub async fn bind(config: &RelayConfig) -> Result<Self, NetworkError> {
        let source_listener = bind_listener(config.network.source_addr()?).await?;
        let destination_listener = bind_listener(config.network.destination_addr()?).await?;
        Ok(Self {
            source_listener,
            destination_listener,
            limits: config.limits.clone(),
        })
    }

    /// Local address of the source listener (useful when bound to port 0).
    pub fn source_addr(&self) -> io::Result<SocketAddr> {
        self.source_listener.local_addr()
    }

    /// Local address of the destination listener.
    pub fn destination_addr(&self) -> io::Result<SocketAddr> {
        self.destination_listener.local_addr()
    }

    /// Runs the acceptors and the dispatch loop on the current task.
    ///
    /// Does not return while the acceptors are alive.
    pub async fn run<E: EventSink + 'static>(self, events: E) {
        let (tx, rx) = mpsc::channel::<TcpDispatchEvent>(DISPATCH_CHANNEL_CAPACITY);
        let ids = Arc::new(ConnectionIdAllocator::new());

        tokio::spawn(accept_sources(
            self.source_listener,
            tx.clone(),
            Arc::clone(&ids),
            self.limits.max_frame_size,
        ));
        tokio::spawn(accept_destinations(
            self.destination_listener,
            tx,
            ids,
            self.limits.destination_queue_depth,
        ));

        Dispatcher::new(self.limits.destination_capacity, events, rx)
            .run()
            .await;
    }

    /// Spawns [`run`](Self::run) on a new task.
    pub fn spawn<E: EventSink + 'static>(self, events: E) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| NetworkError::BindFailed { addr, source })?;
    info!(%addr, "listening");
    Ok(listener)
}

async fn accept_sources(
    listener: TcpListener,
    tx: mpsc::Sender<TcpDispatchEvent>,
    ids: Arc<ConnectionIdAllocator>,
    max_frame_size: usize,
) {
    while !tx.is_closed() {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if !spawn_source(ids.next(), stream, peer, max_frame_size, tx.clone()).await {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "source accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

async fn accept_destinations(
    listener: TcpListener,
    tx: mpsc::Sender<TcpDispatchEvent>,
    ids: Arc<ConnectionIdAllocator>,
    queue_depth: usize,
) {
    while !tx.is_closed() {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if !spawn_destination(ids.next(), stream, peer, queue_depth, tx.clone()).await {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "destination accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}
