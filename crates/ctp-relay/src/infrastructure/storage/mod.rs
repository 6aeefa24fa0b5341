//! File-system storage.
//!
//! - **`config`** – Reads [`RelayConfig`](crate::domain::RelayConfig) from a
//!   TOML file, falling back to defaults when the file does not exist.

pub mod config;
