//! Liveness reaper: detects closed destinations and frees their slots.
//!
//! Destinations never send anything the relay cares about, so the only thing
//! their inbound side can tell us is whether the peer is still there.  Each
//! destination task keeps a read pending on its socket; when the read
//! completes the result is classified here:
//!
//! | probe result            | classification  |
//! |-------------------------|-----------------|
//! | `Ok(0)` (EOF)           | `Disconnected`  |
//! | `Ok(n)`, `n > 0`        | `Alive`, bytes discarded |
//! | `Err(Interrupted / WouldBlock)` | `Alive`, retried |
//! | any other `Err`         | `Disconnected`  |
//!
//! Reaping itself happens in the dispatch loop: the registry slot is freed
//! only when the loop handles the closure notification, never from inside a
//! connection task.

use std::io;

use crate::application::registry::{ConnectionRegistry, FrameSink, PeerHandle};
use crate::domain::connection_id::ConnectionId;
use crate::domain::events::{EventSink, RelayEvent};

/// Classification of one destination probe read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Disconnected,
}

/// Classifies the result of a destination probe read.
pub fn classify_probe(result: &io::Result<usize>) -> Liveness {
    match result {
        Ok(0) => Liveness::Disconnected,
        Ok(_) => Liveness::Alive,
        Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
            Liveness::Alive
        }
        Err(_) => Liveness::Disconnected,
    }
}

/// Removes the destination `id` from the registry and emits
/// `destination_disconnected`.
///
/// Returns the freed slot, or `None` if `id` no longer holds a slot (it was
/// already reaped, or never admitted); in that case nothing is emitted.
pub fn reap<S, D, E>(
    registry: &mut ConnectionRegistry<S, D>,
    id: ConnectionId,
    error: Option<String>,
    events: &mut E,
) -> Option<usize>
where
    S: PeerHandle,
    D: FrameSink,
    E: EventSink + ?Sized,
{
    let slot = registry.slot_of(id)?;
    registry.remove_destination(slot)?;
    events.emit(RelayEvent::DestinationDisconnected { id, slot, error });
    Some(slot)
}
