//! Infrastructure layer for the relay.
//!
//! Contains the OS-facing adapters: TCP listeners and per-connection tasks,
//! the config file reader, and the `tracing` event sink.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `ctp_core`, but MUST NOT be imported by the `application` or domain layers.

pub mod logging;
pub mod network;
pub mod storage;
