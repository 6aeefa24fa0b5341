//! `tracing` integration.
//!
//! [`init_tracing`] installs the global `fmt` subscriber; [`TracingEventSink`]
//! turns each [`RelayEvent`] into one structured log record.
//!
//! | Event                          | Level  |
//! |--------------------------------|--------|
//! | source / destination connected | `info` |
//! | orderly disconnects            | `info` |
//! | disconnects with an error      | `warn` |
//! | capacity drop, validation failure, send error | `warn` |
//! | frame relayed                  | `debug` |
//!
//! Every record carries an `event` field with the event's snake_case name so
//! logs can be filtered by kind.

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::domain::events::{EventSink, RelayEvent};

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is absent or
/// invalid.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// An [`EventSink`] that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: RelayEvent) {
        let name = event.name();
        match event {
            RelayEvent::SourceConnected { id, peer } => {
                info!(event = name, %id, %peer, "source connected");
            }
            RelayEvent::SourceReplaced {
                previous,
                current,
                peer,
            } => {
                info!(event = name, %previous, %current, %peer, "source replaced");
            }
            RelayEvent::SourceDisconnected { id, error: None } => {
                info!(event = name, %id, "source disconnected");
            }
            RelayEvent::SourceDisconnected {
                id,
                error: Some(error),
            } => {
                warn!(event = name, %id, %error, "source disconnected");
            }
            RelayEvent::DestinationConnected { id, slot, peer } => {
                info!(event = name, %id, slot, %peer, "destination connected");
            }
            RelayEvent::DestinationDroppedCapacity { id, peer, capacity } => {
                warn!(event = name, %id, %peer, capacity, "destination table full, connection dropped");
            }
            RelayEvent::DestinationDisconnected {
                id,
                slot,
                error: None,
            } => {
                info!(event = name, %id, slot, "destination disconnected");
            }
            RelayEvent::DestinationDisconnected {
                id,
                slot,
                error: Some(error),
            } => {
                warn!(event = name, %id, slot, %error, "destination disconnected");
            }
            RelayEvent::ValidationFailed {
                source,
                reason,
                size,
            } => {
                warn!(
                    event = name,
                    %source,
                    reason = reason.reason(),
                    detail = %reason,
                    size,
                    "frame dropped"
                );
            }
            RelayEvent::SendError {
                destination,
                slot,
                error,
            } => {
                warn!(event = name, %destination, ?slot, %error, "send to destination failed");
            }
            RelayEvent::FrameRelayed {
                source,
                size,
                delivered,
            } => {
                debug!(event = name, %source, size, delivered, "frame relayed");
            }
        }
    }
}
