//! Relay configuration schema.
//!
//! [`RelayConfig`] is the single source of truth for runtime settings.  It can
//! be deserialized from TOML, built from CLI arguments, or taken from
//! defaults that reproduce the classic relay setup (source on 33333,
//! destinations on 44444, 100 destination slots, 70000-byte read buffer).
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! source_port = 33333
//! destination_port = 44444
//!
//! [limits]
//! max_frame_size = 70000
//! destination_capacity = 100
//! destination_queue_depth = 64
//! ```
//!
//! Fields annotated with `#[serde(default = "...")]` fall back to their
//! default when absent, so a partial file only overrides what it names.
//!
//! Reading the file from disk lives in `infrastructure::storage::config`; this
//! module performs no I/O.

use std::net::{IpAddr, SocketAddr};

use ctp_core::HEADER_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address: '{0}'")]
    InvalidBindAddress(String),

    /// The read buffer could not hold even a frame header.
    #[error("max_frame_size must be at least {min} bytes, got {value}")]
    FrameSizeTooSmall { value: usize, min: usize },

    /// A destination table with no slots would drop every consumer.
    #[error("destination_capacity must be at least 1")]
    ZeroCapacity,

    /// A zero-depth queue cannot hold a single frame.
    #[error("destination_queue_depth must be at least 1")]
    ZeroQueueDepth,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Listener addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address both listeners bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port for the single source connection.
    #[serde(default = "default_source_port")]
    pub source_port: u16,
    /// TCP port for destination connections.
    #[serde(default = "default_destination_port")]
    pub destination_port: u16,
}

/// Capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Upper bound of one source read, and therefore of one frame.
    ///
    /// The default of 70000 exceeds the largest encodable frame
    /// (8 + 65535 bytes), so no well-formed frame is truncated by the cap.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Number of destination slots.
    #[serde(default = "default_destination_capacity")]
    pub destination_capacity: usize,
    /// Frames buffered per destination before further frames are dropped for it.
    #[serde(default = "default_destination_queue_depth")]
    pub destination_queue_depth: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_source_port() -> u16 {
    33333
}
fn default_destination_port() -> u16 {
    44444
}
fn default_max_frame_size() -> usize {
    70000
}
fn default_destination_capacity() -> usize {
    100
}
fn default_destination_queue_depth() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            source_port: default_source_port(),
            destination_port: default_destination_port(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            destination_capacity: default_destination_capacity(),
            destination_queue_depth: default_destination_queue_depth(),
        }
    }
}

// ── Derived values and validation ─────────────────────────────────────────────

impl RelayConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Checks every field for values the relay cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.bind_ip()?;
        if self.limits.max_frame_size < HEADER_SIZE {
            return Err(ConfigError::FrameSizeTooSmall {
                value: self.limits.max_frame_size,
                min: HEADER_SIZE,
            });
        }
        if self.limits.destination_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.limits.destination_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        Ok(())
    }
}

impl NetworkConfig {
    /// Parses `bind_address` as an IP address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if it is not one.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }

    /// Socket address of the source listener.
    pub fn source_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.source_port))
    }

    /// Socket address of the destination listener.
    pub fn destination_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.destination_port))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
