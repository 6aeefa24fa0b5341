//! In-memory connection handles and event sink for unit testing.
//!
//! # Why mocks?
//!
//! The real handles in `infrastructure::network` wrap live TCP sockets served
//! by their own Tokio tasks.  Registry, relay, reaper and dispatch logic only
//! needs the [`PeerHandle`] / [`FrameSink`] contract, so these mocks record
//! what was done to them instead:
//!
//! - [`MockSource`] records whether it was closed.
//! - [`MockDestination`] records every frame it was handed, and can be told to
//!   refuse frames to exercise the send-error path.
//! - [`RecordingEventSink`] records every [`RelayEvent`] in emission order.
//!
//! All three are `Clone` and share their state between clones, so a test can
//! hand one clone to the registry and keep another for assertions.
//!
//! ```ignore
//! let dest = MockDestination::new(10);
//! registry.accept_destination(dest.clone());
//! registry.broadcast(&frame);
//! assert_eq!(dest.received(), vec![frame]);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::application::registry::{FrameSink, PeerHandle, SendFrameError};
use crate::domain::connection_id::ConnectionId;
use crate::domain::events::{EventSink, RelayEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn loopback(port: u64) -> SocketAddr {
    let port = u16::try_from(port % u64::from(u16::MAX)).unwrap_or(0);
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

// ── MockSource ────────────────────────────────────────────────────────────────

/// A source handle that only remembers whether it was closed.
#[derive(Debug, Clone)]
pub struct MockSource {
    id: ConnectionId,
    peer: SocketAddr,
    closed: Arc<AtomicBool>,
}

impl MockSource {
    /// Creates a source with id `id` and a loopback peer address derived from it.
    pub fn new(id: u64) -> Self {
        Self {
            id: ConnectionId(id),
            peer: loopback(id),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PeerHandle for MockSource {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ── MockDestination ───────────────────────────────────────────────────────────

/// A destination handle that records frames instead of writing them.
#[derive(Debug, Clone)]
pub struct MockDestination {
    id: ConnectionId,
    peer: SocketAddr,
    closed: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<Bytes>>>,
    /// When set, every `send_frame` returns this error and records nothing.
    fail_with: Option<SendFrameError>,
}

impl MockDestination {
    pub fn new(id: u64) -> Self {
        Self {
            id: ConnectionId(id),
            peer: loopback(id),
            closed: Arc::new(AtomicBool::new(false)),
            received: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    /// Creates a destination whose every `send_frame` fails with `error`.
    pub fn failing(id: u64, error: SendFrameError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new(id)
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Frames accepted so far, in the order they were handed over.
    pub fn received(&self) -> Vec<Bytes> {
        lock(&self.received).clone()
    }
}

impl PeerHandle for MockDestination {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl FrameSink for MockDestination {
    fn send_frame(&self, frame: Bytes) -> Result<(), SendFrameError> {
        if let Some(error) = self.fail_with {
            return Err(error);
        }
        if self.is_closed() {
            return Err(SendFrameError::Closed);
        }
        lock(&self.received).push(frame);
        Ok(())
    }
}

// ── RecordingEventSink ────────────────────────────────────────────────────────

/// An [`EventSink`] that keeps every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<RelayEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, oldest first.
    pub fn events(&self) -> Vec<RelayEvent> {
        lock(&self.events).clone()
    }

    /// Names of all events emitted so far, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(RelayEvent::name).collect()
    }

    /// Number of recorded events named `name`.
    pub fn count(&self, name: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&mut self, event: RelayEvent) {
        lock(&self.events).push(event);
    }
}
