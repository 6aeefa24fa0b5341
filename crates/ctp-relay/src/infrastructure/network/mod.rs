//! TCP infrastructure for the relay.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the source and destination listeners, runs one
//!   acceptor task per listener, and drives the dispatch loop.
//!
//! - **`source`** – The source connection handle and its reader task.  Each
//!   read becomes one `SourceReadable` notification.
//!
//! - **`destination`** – The destination connection handle and its session
//!   task, which writes queued frames and watches the socket for EOF.
//!
//! Every task reports to the dispatcher over one bounded channel of
//! [`TcpDispatchEvent`]s.  Handles close their connection when dropped: each
//! owns the sending half of a `oneshot` whose receiver the task selects on.

use std::net::SocketAddr;

use thiserror::Error;

use crate::application::dispatch::DispatchEvent;
use crate::domain::config::ConfigError;

pub mod destination;
pub mod listener;
pub mod source;

pub use destination::TcpDestination;
pub use listener::RelayServer;
pub use source::TcpSource;

/// Notification type carried on the dispatch channel in production.
pub type TcpDispatchEvent = DispatchEvent<TcpSource, TcpDestination>;

/// Capacity of the shared dispatch channel.
pub const DISPATCH_CHANNEL_CAPACITY: usize = 1024;

/// Error type for listener setup.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid listener configuration: {0}")]
    Config(#[from] ConfigError),
}
