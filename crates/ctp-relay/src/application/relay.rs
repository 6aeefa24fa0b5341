//! Relay engine: source read, validation, and fan-out.
//!
//! # Pipeline
//!
//! ```text
//! source socket ──read (≤ max_frame_size)──▶ candidate ──validate──┬─ ok ──▶ registry.broadcast
//!                                                                  └─ err ─▶ drop, emit validation_failed
//! ```
//!
//! One transport read yields exactly one candidate frame.  Frames split across
//! reads, or several frames coalesced into one read, are not reassembled and
//! fail validation as a whole.
//!
//! The read half ([`CandidateReader`]) runs inside the source's connection
//! task; the validate-and-broadcast half ([`relay_candidate`]) runs inside the
//! dispatch loop, which owns the registry.

use std::io;

use bytes::{Bytes, BytesMut};
use ctp_core::{validate, ValidationError};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::registry::{
    BroadcastReport, ConnectionRegistry, FrameSink, PeerHandle,
};
use crate::domain::connection_id::ConnectionId;
use crate::domain::events::{EventSink, RelayEvent};

/// Result of one bounded source read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The bytes of one read; never empty.
    Candidate(Bytes),
    /// The peer closed (`None`) or the read failed (`Some`).
    Disconnected(Option<io::Error>),
}

/// Reads candidate frames from a source stream, one read per candidate.
///
/// The read buffer is zeroed once and reused for every read.  Each candidate
/// is copied out at its actual length, so a small frame never keeps a
/// `max_frame_size` allocation alive while destinations hold it.
pub struct CandidateReader<R> {
    reader: R,
    buffer: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> CandidateReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::zeroed(max_frame_size),
            max_frame_size,
        }
    }

    /// Performs one read of at most `max_frame_size` bytes.
    pub async fn next_candidate(&mut self) -> ReadOutcome {
        loop {
            match self.reader.read(&mut self.buffer[..self.max_frame_size]).await {
                Ok(0) => return ReadOutcome::Disconnected(None),
                Ok(n) => return ReadOutcome::Candidate(Bytes::copy_from_slice(&self.buffer[..n])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return ReadOutcome::Disconnected(Some(e)),
            }
        }
    }
}

/// What [`relay_candidate`] did with a candidate frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The frame was valid and offered to every occupied slot.
    Forwarded(BroadcastReport),
    /// The frame failed validation and was discarded.
    Dropped(ValidationError),
}

/// Validates `candidate` and, if it is a well-formed frame, broadcasts it
/// verbatim to every destination in slot order.
///
/// A rejected frame leaves the source connected.  A destination that cannot
/// take the frame is reported with a `send_error` event and otherwise left
/// alone; the remaining destinations still receive it.
pub fn relay_candidate<S, D, E>(
    registry: &ConnectionRegistry<S, D>,
    source: ConnectionId,
    candidate: Bytes,
    events: &mut E,
) -> RelayOutcome
where
    S: PeerHandle,
    D: FrameSink,
    E: EventSink + ?Sized,
{
    let size = candidate.len();

    if let Err(reason) = validate(&candidate) {
        events.emit(RelayEvent::ValidationFailed {
            source,
            reason,
            size,
        });
        return RelayOutcome::Dropped(reason);
    }

    let report = registry.broadcast(&candidate);
    for failure in &report.failures {
        events.emit(RelayEvent::SendError {
            destination: failure.id,
            slot: Some(failure.slot),
            error: failure.error.to_string(),
        });
    }
    events.emit(RelayEvent::FrameRelayed {
        source,
        size,
        delivered: report.delivered,
    });

    RelayOutcome::Forwarded(report)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
