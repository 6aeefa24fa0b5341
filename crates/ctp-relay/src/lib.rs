//! ctp-relay library crate.
//!
//! Accepts one trusted *source* connection and up to a fixed number of
//! *destination* connections, and forwards every valid CTP frame the source
//! sends to all destinations, byte-for-byte and in order.
//!
//! # Architecture
//!
//! ```text
//! source ──TCP──► source task ─┐
//!                              │   DispatchEvent (mpsc)
//! dest ◄──TCP──► dest task ────┼──────────────► Dispatcher ──► ConnectionRegistry
//!    ▲                         │                  │
//!    └──── frame queue ◄───────┘◄─────────────────┘ broadcast
//! ```
//!
//! - `domain/`          Pure types: config schema, connection ids, relay events.
//! - `application/`     Registry, relay engine, liveness reaper, dispatch loop.
//! - `infrastructure/`  TCP listeners, per-connection tasks, logging, config file.
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `ctp-core`; it sees connections only
//!   through the [`application::registry::PeerHandle`] and
//!   [`application::registry::FrameSink`] traits.
//! - `infrastructure` implements those traits over `tokio::net`.

pub mod application;
pub mod domain;
pub mod infrastructure;
