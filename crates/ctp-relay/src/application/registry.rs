//! ConnectionRegistry: the source slot and the destination slot table.
//!
//! # Slot model
//!
//! ```text
//! source:        [ Some(conn#7) ]
//! destinations:  [ Some(conn#2) | None | Some(conn#9) | None | ... ]   (capacity N)
//!                    slot 0       slot 1   slot 2       slot 3
//! ```
//!
//! - There is at most one source.  Admitting a new one closes the old one
//!   first; the two are never live at the same time.
//! - A new destination takes the lowest free slot.  When every slot is taken
//!   the new connection is closed on the spot.  Existing slots are never
//!   evicted to make room.
//! - A slot becomes free only when its destination is removed.
//!
//! The registry is owned by the dispatch loop and mutated nowhere else, so it
//! needs no locking.

use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

use crate::domain::connection_id::ConnectionId;

/// Why a frame could not be handed to a destination.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SendFrameError {
    /// The destination's outgoing queue is full; the frame is dropped for it.
    #[error("outgoing queue full")]
    QueueFull,
    /// The destination's writer has already stopped.
    #[error("destination writer closed")]
    Closed,
}

/// A connection the registry can hold and close.
pub trait PeerHandle {
    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;

    /// Closes the underlying connection.
    fn close(self)
    where
        Self: Sized;
}

/// A destination connection that accepts frames for delivery.
pub trait FrameSink: PeerHandle {
    /// Queues `frame` for delivery without waiting for the write.
    ///
    /// # Errors
    ///
    /// Returns [`SendFrameError`] if the frame cannot be queued.
    fn send_frame(&self, frame: Bytes) -> Result<(), SendFrameError>;
}

/// Result of [`ConnectionRegistry::accept_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAdmission {
    /// The slot was empty.
    Connected,
    /// The slot held `previous`, which has been closed.
    Replaced { previous: ConnectionId },
}

/// Result of [`ConnectionRegistry::accept_destination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationAdmission {
    Admitted { slot: usize },
    /// Every slot was occupied; the connection has been closed.
    DroppedCapacity,
}

/// One destination that did not take a broadcast frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub slot: usize,
    pub id: ConnectionId,
    pub error: SendFrameError,
}

/// Outcome of one [`ConnectionRegistry::broadcast`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Destinations that accepted the frame.
    pub delivered: usize,
    /// Destinations that did not, in slot order.
    pub failures: Vec<DeliveryFailure>,
}

/// Owner of every admitted connection.
pub struct ConnectionRegistry<S, D> {
    source: Option<S>,
    destinations: Vec<Option<D>>,
}

impl<S: PeerHandle, D: FrameSink> ConnectionRegistry<S, D> {
    /// Creates an empty registry with `capacity` destination slots.
    pub fn new(capacity: usize) -> Self {
        let mut destinations = Vec::with_capacity(capacity);
        destinations.resize_with(capacity, || None);
        Self {
            source: None,
            destinations,
        }
    }

    // ── Source slot ───────────────────────────────────────────────────────────

    /// Installs `handle` as the source, closing any previous source first.
    pub fn accept_source(&mut self, handle: S) -> SourceAdmission {
        let admission = match self.source.take() {
            Some(previous) => {
                let previous_id = previous.id();
                previous.close();
                SourceAdmission::Replaced {
                    previous: previous_id,
                }
            }
            None => SourceAdmission::Connected,
        };
        self.source = Some(handle);
        admission
    }

    /// Closes and clears the source.  Returns the removed id, or `None` if the
    /// slot was already empty.
    pub fn remove_source(&mut self) -> Option<ConnectionId> {
        let source = self.source.take()?;
        let id = source.id();
        source.close();
        Some(id)
    }

    pub fn source_id(&self) -> Option<ConnectionId> {
        self.source.as_ref().map(PeerHandle::id)
    }

    // ── Destination table ─────────────────────────────────────────────────────

    /// Stores `handle` in the lowest free slot, or closes it if the table is
    /// full.
    pub fn accept_destination(&mut self, handle: D) -> DestinationAdmission {
        match self.destinations.iter().position(Option::is_none) {
            Some(slot) => {
                self.destinations[slot] = Some(handle);
                DestinationAdmission::Admitted { slot }
            }
            None => {
                handle.close();
                DestinationAdmission::DroppedCapacity
            }
        }
    }

    /// Closes the destination in `slot` and frees it.  Returns the removed id,
    /// or `None` if the slot was already free or out of range.
    pub fn remove_destination(&mut self, slot: usize) -> Option<ConnectionId> {
        let handle = self.destinations.get_mut(slot)?.take()?;
        let id = handle.id();
        handle.close();
        Some(id)
    }

    /// Returns the slot currently holding connection `id`.
    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.destinations
            .iter()
            .position(|entry| entry.as_ref().is_some_and(|d| d.id() == id))
    }

    /// Returns the id held in `slot`.
    pub fn destination_at(&self, slot: usize) -> Option<ConnectionId> {
        self.destinations.get(slot)?.as_ref().map(PeerHandle::id)
    }

    pub fn destination_count(&self) -> usize {
        self.destinations.iter().filter(|d| d.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_full(&self) -> bool {
        self.destinations.iter().all(Option::is_some)
    }

    // ── Fan-out ───────────────────────────────────────────────────────────────

    /// Offers `frame` to every occupied slot in slot order.
    ///
    /// `Bytes` clones share the same buffer, so every destination receives the
    /// exact bytes that were read without a copy per destination.
    pub fn broadcast(&self, frame: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (slot, entry) in self.destinations.iter().enumerate() {
            let Some(destination) = entry else { continue };
            match destination.send_frame(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(error) => report.failures.push(DeliveryFailure {
                    slot,
                    id: destination.id(),
                    error,
                }),
            }
        }
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
