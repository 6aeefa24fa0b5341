//! Structured events emitted by the relay core.
//!
//! The core never formats log lines itself.  It reports what happened as a
//! [`RelayEvent`] to an [`EventSink`]; the binary plugs in a sink that turns
//! events into `tracing` records, and tests plug in one that records them.

use std::net::SocketAddr;

use ctp_core::ValidationError;

use crate::domain::connection_id::ConnectionId;

/// Something the relay core did or observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A source connected while the source slot was empty.
    SourceConnected { id: ConnectionId, peer: SocketAddr },

    /// A source connected while another was active; the previous one was closed.
    SourceReplaced {
        previous: ConnectionId,
        current: ConnectionId,
        peer: SocketAddr,
    },

    /// The active source closed its connection or failed a read.
    SourceDisconnected {
        id: ConnectionId,
        /// Read error text, or `None` for an orderly close.
        error: Option<String>,
    },

    /// A destination was stored in a free slot.
    DestinationConnected {
        id: ConnectionId,
        slot: usize,
        peer: SocketAddr,
    },

    /// A destination was accepted and immediately closed because every slot
    /// was occupied.
    DestinationDroppedCapacity {
        id: ConnectionId,
        peer: SocketAddr,
        capacity: usize,
    },

    /// A destination's connection was detected closed and its slot freed.
    DestinationDisconnected {
        id: ConnectionId,
        slot: usize,
        error: Option<String>,
    },

    /// A candidate frame from the source was rejected and dropped.
    ValidationFailed {
        source: ConnectionId,
        reason: ValidationError,
        size: usize,
    },

    /// A frame could not be handed to, or written to, one destination.
    SendError {
        destination: ConnectionId,
        slot: Option<usize>,
        error: String,
    },

    /// A valid frame was offered to every occupied slot.
    FrameRelayed {
        source: ConnectionId,
        size: usize,
        delivered: usize,
    },
}

impl RelayEvent {
    /// Stable snake_case name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::SourceConnected { .. } => "source_connected",
            RelayEvent::SourceReplaced { .. } => "source_replaced",
            RelayEvent::SourceDisconnected { .. } => "source_disconnected",
            RelayEvent::DestinationConnected { .. } => "destination_connected",
            RelayEvent::DestinationDroppedCapacity { .. } => "destination_dropped_capacity",
            RelayEvent::DestinationDisconnected { .. } => "destination_disconnected",
            RelayEvent::ValidationFailed { .. } => "validation_failed",
            RelayEvent::SendError { .. } => "send_error",
            RelayEvent::FrameRelayed { .. } => "frame_relayed",
        }
    }
}

/// Receiver of [`RelayEvent`]s.
///
/// Only the dispatch loop emits events, so implementations need no internal
/// synchronisation for ordering; `Send` lets the loop run on a Tokio task.
pub trait EventSink: Send {
    fn emit(&mut self, event: RelayEvent);
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&mut self, event: RelayEvent) {
        (**self).emit(event);
    }
}
