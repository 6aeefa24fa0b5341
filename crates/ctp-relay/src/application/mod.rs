//! Application layer: the relay core.
//!
//! # Sub-modules
//!
//! - **`registry`** – Owns the single source slot and the fixed-capacity
//!   destination table.  The only place connections are admitted or closed.
//!
//! - **`relay`** – Bounded source read, frame validation, and broadcast of
//!   valid frames to every destination in slot order.
//!
//! - **`reaper`** – Classifies destination probe results and frees the slots
//!   of destinations that have gone away.
//!
//! - **`dispatch`** – The loop that owns the registry and runs the above in a
//!   fixed order for every batch of readiness notifications.
//!
//! - **`mock`** – In-memory connection handles and a recording event sink for
//!   tests.
//!
//! **Dependency rule**: nothing here touches `tokio::net`; connections are
//! reached only through the [`registry::PeerHandle`] and
//! [`registry::FrameSink`] traits.

pub mod dispatch;
pub mod mock;
pub mod reaper;
pub mod registry;
pub mod relay;
