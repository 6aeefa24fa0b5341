//! Domain layer for ctp-relay.
//!
//! Pure types with no dependencies on sockets, files, or the async runtime:
//!
//! - Configuration schema and its validation rules
//! - Connection identity
//! - The structured events the relay core emits

pub mod config;
pub mod connection_id;
pub mod events;

pub use config::{ConfigError, LimitsConfig, NetworkConfig, RelayConfig};
pub use connection_id::{ConnectionId, ConnectionIdAllocator};
pub use events::{EventSink, RelayEvent};
