//! Process-unique identifiers for accepted connections.
//!
//! # Why connections need an id
//!
//! Each connection is served by its own task, and those tasks report to the
//! dispatch loop through a shared channel.  By the time a report is handled,
//! the connection it refers to may already have been replaced (a newer source
//! took over) or reaped (a destination slot was freed and reused).  Tagging
//! every report with the [`ConnectionId`] of its connection lets the dispatch
//! loop recognise and discard these stale reports.
//!
//! Ids are never sent on the wire.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one accepted TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A thread-safe, monotonically increasing allocator of [`ConnectionId`]s.
///
/// Shared by both acceptor tasks so that sources and destinations never
/// collide.  Ids start at 1.
///
/// # Examples
///
/// ```rust
/// use ctp_relay::domain::{ConnectionId, ConnectionIdAllocator};
///
/// let ids = ConnectionIdAllocator::new();
/// assert_eq!(ids.next(), ConnectionId(1));
/// assert_eq!(ids.next(), ConnectionId(2));
/// ```
pub struct ConnectionIdAllocator {
    inner: AtomicU64,
}

impl ConnectionIdAllocator {
    /// Creates a new allocator whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    ///
    /// `Ordering::Relaxed` is sufficient: ids only need to be unique, they
    /// carry no memory-synchronisation meaning.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.inner.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
