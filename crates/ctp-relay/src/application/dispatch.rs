//! Dispatch loop: the single owner of the connection registry.
//!
//! # Event flow
//!
//! ```text
//!  source acceptor ──┐
//!  dest acceptor ────┤
//!  source task ──────┼──▶ mpsc::Receiver<DispatchEvent> ──▶ Dispatcher ──▶ ConnectionRegistry
//!  dest task × N ────┘                                         │
//!                                                              └──▶ EventSink
//! ```
//!
//! Every connection task and both acceptors report to the dispatcher over one
//! bounded channel.  The dispatcher alone admits, relays to, and removes
//! connections, so the registry is never shared.
//!
//! # Cycles
//!
//! [`Dispatcher::next_cycle`] blocks until one notification is available,
//! drains whatever else is already queued (up to [`MAX_CYCLE_EVENTS`]), and
//! processes the batch in four phases:
//!
//! 1. new sources (`accept_source`)
//! 2. new destinations (`accept_destination`)
//! 3. source reads, in arrival order (relay or `remove_source`)
//! 4. destination closures and write failures, in arrival order (reap)
//!
//! Notifications that name a connection the registry no longer holds are
//! discarded.  This is what makes a replacement in phase 1 turn phase 3 into a
//! no-op for the replaced source's data.

use std::io;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::application::reaper;
use crate::application::registry::{
    ConnectionRegistry, DestinationAdmission, FrameSink, PeerHandle, SourceAdmission,
};
use crate::application::relay::{relay_candidate, ReadOutcome};
use crate::domain::connection_id::ConnectionId;
use crate::domain::events::{EventSink, RelayEvent};

/// Upper bound on notifications handled in one cycle.
pub const MAX_CYCLE_EVENTS: usize = 256;

/// A readiness notification from a connection task or an acceptor.
#[derive(Debug)]
pub enum DispatchEvent<S, D> {
    /// A source connection was accepted.
    SourceConnected(S),
    /// A destination connection was accepted.
    DestinationConnected(D),
    /// The source with `id` completed a read.
    SourceReadable { id: ConnectionId, outcome: ReadOutcome },
    /// The destination probe saw EOF or a fatal error.
    DestinationClosed {
        id: ConnectionId,
        error: Option<io::Error>,
    },
    /// Writing a queued frame to the destination failed.
    DestinationWriteFailed { id: ConnectionId, error: io::Error },
}

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    /// Every notification producer has gone away.
    Terminated,
}

/// Owns the registry and applies notifications to it in phase order.
pub struct Dispatcher<S, D, E> {
    registry: ConnectionRegistry<S, D>,
    events: E,
    rx: mpsc::Receiver<DispatchEvent<S, D>>,
    state: DispatchState,
}

impl<S, D, E> Dispatcher<S, D, E>
where
    S: PeerHandle,
    D: FrameSink,
    E: EventSink,
{
    pub fn new(capacity: usize, events: E, rx: mpsc::Receiver<DispatchEvent<S, D>>) -> Self {
        Self {
            registry: ConnectionRegistry::new(capacity),
            events,
            rx,
            state: DispatchState::Running,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry<S, D> {
        &self.registry
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Runs cycles until every producer has dropped its sender.
    pub async fn run(mut self) {
        while self.next_cycle().await {}
        debug!("dispatch loop terminated");
    }

    /// Waits for at least one notification, then processes it together with
    /// everything already queued.
    ///
    /// Returns `false` once the channel is closed and empty.
    pub async fn next_cycle(&mut self) -> bool {
        let Some(first) = self.rx.recv().await else {
            self.state = DispatchState::Terminated;
            return false;
        };

        let mut batch = Vec::with_capacity(8);
        batch.push(first);
        while batch.len() < MAX_CYCLE_EVENTS {
            match self.rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }

        trace!(events = batch.len(), "dispatch cycle");
        self.dispatch_cycle(batch);
        true
    }

    /// Processes one batch of notifications in phase order.
    pub fn dispatch_cycle(&mut self, batch: Vec<DispatchEvent<S, D>>) {
        let mut sources = Vec::new();
        let mut destinations = Vec::new();
        let mut reads = Vec::new();
        let mut closures = Vec::new();

        for event in batch {
            match event {
                DispatchEvent::SourceConnected(handle) => sources.push(handle),
                DispatchEvent::DestinationConnected(handle) => destinations.push(handle),
                DispatchEvent::SourceReadable { id, outcome } => reads.push((id, outcome)),
                other => closures.push(other),
            }
        }

        for handle in sources {
            self.admit_source(handle);
        }
        for handle in destinations {
            self.admit_destination(handle);
        }
        for (id, outcome) in reads {
            self.handle_source_read(id, outcome);
        }
        for event in closures {
            self.handle_destination_event(event);
        }
    }

    // ── Phase handlers ────────────────────────────────────────────────────────

    fn admit_source(&mut self, handle: S) {
        let id = handle.id();
        let peer = handle.peer_addr();
        let event = match self.registry.accept_source(handle) {
            SourceAdmission::Connected => RelayEvent::SourceConnected { id, peer },
            SourceAdmission::Replaced { previous } => RelayEvent::SourceReplaced {
                previous,
                current: id,
                peer,
            },
        };
        self.events.emit(event);
    }

    fn admit_destination(&mut self, handle: D) {
        let id = handle.id();
        let peer = handle.peer_addr();
        let event = match self.registry.accept_destination(handle) {
            DestinationAdmission::Admitted { slot } => {
                RelayEvent::DestinationConnected { id, slot, peer }
            }
            DestinationAdmission::DroppedCapacity => RelayEvent::DestinationDroppedCapacity {
                id,
                peer,
                capacity: self.registry.capacity(),
            },
        };
        self.events.emit(event);
    }

    fn handle_source_read(&mut self, id: ConnectionId, outcome: ReadOutcome) {
        if self.registry.source_id() != Some(id) {
            trace!(%id, "discarding read from inactive source");
            return;
        }
        match outcome {
            ReadOutcome::Candidate(candidate) => {
                relay_candidate(&self.registry, id, candidate, &mut self.events);
            }
            ReadOutcome::Disconnected(error) => {
                self.registry.remove_source();
                self.events.emit(RelayEvent::SourceDisconnected {
                    id,
                    error: error.map(|e| e.to_string()),
                });
            }
        }
    }

    fn handle_destination_event(&mut self, event: DispatchEvent<S, D>) {
        match event {
            DispatchEvent::DestinationClosed { id, error } => {
                reaper::reap(
                    &mut self.registry,
                    id,
                    error.map(|e| e.to_string()),
                    &mut self.events,
                );
            }
            DispatchEvent::DestinationWriteFailed { id, error } => {
                let Some(slot) = self.registry.slot_of(id) else {
                    return;
                };
                self.events.emit(RelayEvent::SendError {
                    destination: id,
                    slot: Some(slot),
                    error: error.to_string(),
                });
            }
            // Phases 1-3 are split off in `dispatch_cycle`.
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mock::{MockDestination, MockSource, RecordingEventSink};
    use bytes::Bytes;
    use ctp_core::{encode_frame, FrameOptions};

    type Event = DispatchEvent<MockSource, MockDestination>;
    type TestDispatcher = Dispatcher<MockSource, MockDestination, RecordingEventSink>;

    fn new_dispatcher(capacity: usize) -> (TestDispatcher, RecordingEventSink, mpsc::Sender<Event>) {
        let (tx, rx) = mpsc::channel(64);
        let events = RecordingEventSink::new();
        (Dispatcher::new(capacity, events.clone(), rx), events, tx)
    }

    fn frame(payload: &[u8]) -> Bytes {
        Bytes::from(encode_frame(FrameOptions::none(), payload).unwrap())
    }

    fn readable(id: u64, bytes: Bytes) -> Event {
        DispatchEvent::SourceReadable {
            id: ConnectionId(id),
            outcome: ReadOutcome::Candidate(bytes),
        }
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    #[test]
    fn test_sources_are_admitted_before_destinations_in_a_cycle() {
        // Arrange
        let (mut dispatcher, events, _tx) = new_dispatcher(4);

        // Act: destination arrives first in the batch
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::DestinationConnected(MockDestination::new(10)),
            DispatchEvent::SourceConnected(MockSource::new(1)),
        ]);

        // Assert
        assert_eq!(
            events.names(),
            vec!["source_connected", "destination_connected"]
        );
    }

    #[test]
    fn test_second_source_replaces_first() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        let first = MockSource::new(1);
        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceConnected(first.clone())]);

        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceConnected(MockSource::new(2))]);

        assert!(first.is_closed());
        assert_eq!(dispatcher.registry().source_id(), Some(ConnectionId(2)));
        assert!(matches!(
            events.events()[1],
            RelayEvent::SourceReplaced {
                previous: ConnectionId(1),
                current: ConnectionId(2),
                ..
            }
        ));
    }

    #[test]
    fn test_destination_over_capacity_is_dropped_and_reported() {
        let (mut dispatcher, events, _tx) = new_dispatcher(1);
        let late = MockDestination::new(11);

        dispatcher.dispatch_cycle(vec![
            DispatchEvent::DestinationConnected(MockDestination::new(10)),
            DispatchEvent::DestinationConnected(late.clone()),
        ]);

        assert!(late.is_closed());
        assert_eq!(
            events.names(),
            vec!["destination_connected", "destination_dropped_capacity"]
        );
        assert!(matches!(
            events.events()[1],
            RelayEvent::DestinationDroppedCapacity { capacity: 1, .. }
        ));
    }

    // ── Source reads ──────────────────────────────────────────────────────────

    #[test]
    fn test_connect_and_read_in_one_cycle_relays_frame() {
        // Arrange
        let (mut dispatcher, _events, _tx) = new_dispatcher(4);
        let dest = MockDestination::new(10);
        let data = frame(b"payload");

        // Act: all three notifications land in the same cycle
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::SourceConnected(MockSource::new(1)),
            readable(1, data.clone()),
            DispatchEvent::DestinationConnected(dest.clone()),
        ]);

        // Assert: destination admitted in phase 2 sees phase 3's frame
        assert_eq!(dest.received(), vec![data]);
    }

    #[test]
    fn test_replacement_discards_replaced_source_data_in_same_cycle() {
        // Arrange
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        let dest = MockDestination::new(10);
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::SourceConnected(MockSource::new(1)),
            DispatchEvent::DestinationConnected(dest.clone()),
        ]);

        // Act: data from source 1 and the arrival of source 2 in one batch
        dispatcher.dispatch_cycle(vec![
            readable(1, frame(b"stale")),
            DispatchEvent::SourceConnected(MockSource::new(2)),
        ]);

        // Assert
        assert!(dest.received().is_empty());
        assert_eq!(events.count("frame_relayed"), 0);
        assert_eq!(events.count("source_replaced"), 1);
    }

    #[test]
    fn test_new_source_data_flows_after_replacement() {
        let (mut dispatcher, _events, _tx) = new_dispatcher(4);
        let dest = MockDestination::new(10);
        let data = frame(b"fresh");
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::SourceConnected(MockSource::new(1)),
            DispatchEvent::DestinationConnected(dest.clone()),
        ]);

        dispatcher.dispatch_cycle(vec![
            readable(1, frame(b"stale")),
            DispatchEvent::SourceConnected(MockSource::new(2)),
            readable(2, data.clone()),
        ]);

        assert_eq!(dest.received(), vec![data]);
    }

    #[test]
    fn test_invalid_frame_keeps_source_connected() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        let source = MockSource::new(1);
        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceConnected(source.clone())]);

        dispatcher.dispatch_cycle(vec![readable(1, Bytes::from_static(&[0xCC, 0x00, 0x00]))]);

        assert!(!source.is_closed());
        assert_eq!(dispatcher.registry().source_id(), Some(ConnectionId(1)));
        assert_eq!(events.count("validation_failed"), 1);
    }

    #[test]
    fn test_source_disconnect_empties_slot() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        let source = MockSource::new(1);
        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceConnected(source.clone())]);

        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceReadable {
            id: ConnectionId(1),
            outcome: ReadOutcome::Disconnected(None),
        }]);

        assert!(source.is_closed());
        assert_eq!(dispatcher.registry().source_id(), None);
        assert_eq!(
            events.events().last(),
            Some(&RelayEvent::SourceDisconnected {
                id: ConnectionId(1),
                error: None,
            })
        );
    }

    #[test]
    fn test_disconnect_from_replaced_source_is_ignored() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::SourceConnected(MockSource::new(1)),
            DispatchEvent::SourceConnected(MockSource::new(2)),
        ]);

        dispatcher.dispatch_cycle(vec![DispatchEvent::SourceReadable {
            id: ConnectionId(1),
            outcome: ReadOutcome::Disconnected(None),
        }]);

        assert_eq!(dispatcher.registry().source_id(), Some(ConnectionId(2)));
        assert_eq!(events.count("source_disconnected"), 0);
    }

    // ── Destination closures ──────────────────────────────────────────────────

    #[test]
    fn test_destination_connect_and_close_in_one_cycle() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);

        dispatcher.dispatch_cycle(vec![
            DispatchEvent::DestinationClosed {
                id: ConnectionId(10),
                error: None,
            },
            DispatchEvent::DestinationConnected(MockDestination::new(10)),
        ]);

        assert_eq!(dispatcher.registry().destination_count(), 0);
        assert_eq!(
            events.names(),
            vec!["destination_connected", "destination_disconnected"]
        );
    }

    #[test]
    fn test_closed_destination_stops_receiving_frames() {
        // Arrange
        let (mut dispatcher, _events, _tx) = new_dispatcher(4);
        let gone = MockDestination::new(10);
        let stays = MockDestination::new(11);
        dispatcher.dispatch_cycle(vec![
            DispatchEvent::SourceConnected(MockSource::new(1)),
            DispatchEvent::DestinationConnected(gone.clone()),
            DispatchEvent::DestinationConnected(stays.clone()),
        ]);

        // Act
        dispatcher.dispatch_cycle(vec![DispatchEvent::DestinationClosed {
            id: ConnectionId(10),
            error: Some(io::Error::from(io::ErrorKind::ConnectionReset)),
        }]);
        dispatcher.dispatch_cycle(vec![readable(1, frame(b"after"))]);

        // Assert
        assert!(gone.is_closed());
        assert!(gone.received().is_empty());
        assert_eq!(stays.received().len(), 1);
        assert_eq!(dispatcher.registry().slot_of(ConnectionId(11)), Some(1));
    }

    #[test]
    fn test_write_failure_reports_send_error_with_slot() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);
        dispatcher.dispatch_cycle(vec![DispatchEvent::DestinationConnected(
            MockDestination::new(10),
        )]);

        dispatcher.dispatch_cycle(vec![DispatchEvent::DestinationWriteFailed {
            id: ConnectionId(10),
            error: io::Error::from(io::ErrorKind::BrokenPipe),
        }]);

        assert!(matches!(
            events.events().last(),
            Some(RelayEvent::SendError {
                destination: ConnectionId(10),
                slot: Some(0),
                ..
            })
        ));
        // The slot is freed only by the reaper
        assert_eq!(dispatcher.registry().destination_count(), 1);
    }

    #[test]
    fn test_write_failure_from_unknown_destination_is_ignored() {
        let (mut dispatcher, events, _tx) = new_dispatcher(4);

        dispatcher.dispatch_cycle(vec![DispatchEvent::DestinationWriteFailed {
            id: ConnectionId(99),
            error: io::Error::from(io::ErrorKind::BrokenPipe),
        }]);

        assert!(events.events().is_empty());
    }

    // ── Channel-driven cycles ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_next_cycle_drains_queued_notifications_into_one_batch() {
        // Arrange
        let (mut dispatcher, events, tx) = new_dispatcher(4);
        tx.send(DispatchEvent::DestinationConnected(MockDestination::new(10)))
            .await
            .unwrap();
        tx.send(DispatchEvent::SourceConnected(MockSource::new(1)))
            .await
            .unwrap();

        // Act
        let running = dispatcher.next_cycle().await;

        // Assert: phase order applied across both queued notifications
        assert!(running);
        assert_eq!(
            events.names(),
            vec!["source_connected", "destination_connected"]
        );
    }

    #[tokio::test]
    async fn test_next_cycle_terminates_when_producers_are_gone() {
        let (mut dispatcher, _events, tx) = new_dispatcher(4);
        drop(tx);

        let running = dispatcher.next_cycle().await;

        assert!(!running);
        assert_eq!(dispatcher.state(), DispatchState::Terminated);
    }

    #[tokio::test]
    async fn test_run_processes_until_channel_closes() {
        let (dispatcher, events, tx) = new_dispatcher(4);
        let task = tokio::spawn(dispatcher.run());

        tx.send(DispatchEvent::SourceConnected(MockSource::new(1)))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(events.names(), vec!["source_connected"]);
    }
}
