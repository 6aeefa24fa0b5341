//! CTP relay — entry point.
//!
//! Accepts one source connection and many destination connections, and
//! forwards every valid CTP frame from the source to all destinations.
//!
//! # Usage
//!
//! ```text
//! ctp-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>                  TOML config file (missing file = defaults)
//!   --bind <ADDR>                    Listener IP address [default: 0.0.0.0]
//!   --source-port <PORT>             Source listener port [default: 33333]
//!   --destination-port <PORT>        Destination listener port [default: 44444]
//!   --max-frame-size <BYTES>         Largest single source read [default: 70000]
//!   --destination-capacity <N>       Destination slots [default: 100]
//!   --log-level <LEVEL>              Log level when RUST_LOG is unset [default: info]
//! ```
//!
//! # Precedence
//!
//! CLI flag > `CTP_*` environment variable > config file > built-in default.
//!
//! | Variable                   | Flag                     |
//! |----------------------------|--------------------------|
//! | `CTP_CONFIG`               | `--config`               |
//! | `CTP_BIND`                 | `--bind`                 |
//! | `CTP_SOURCE_PORT`          | `--source-port`          |
//! | `CTP_DESTINATION_PORT`     | `--destination-port`     |
//! | `CTP_MAX_FRAME_SIZE`       | `--max-frame-size`       |
//! | `CTP_DESTINATION_CAPACITY` | `--destination-capacity` |
//! | `CTP_LOG_LEVEL`            | `--log-level`            |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ctp_relay::domain::RelayConfig;
use ctp_relay::infrastructure::logging::{init_tracing, TracingEventSink};
use ctp_relay::infrastructure::network::RelayServer;
use ctp_relay::infrastructure::storage::config::load_config;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-source, multi-destination relay for CTP frames.
///
/// Every flag is optional; an unset flag leaves the config file value (or the
/// built-in default) in place.
#[derive(Debug, Parser)]
#[command(
    name = "ctp-relay",
    about = "Relay validated CTP frames from one source to many destinations",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "CTP_CONFIG")]
    config: Option<PathBuf>,

    /// IP address both listeners bind to.
    #[arg(long, env = "CTP_BIND")]
    bind: Option<String>,

    /// TCP port for the source connection.
    #[arg(long, env = "CTP_SOURCE_PORT")]
    source_port: Option<u16>,

    /// TCP port for destination connections.
    #[arg(long, env = "CTP_DESTINATION_PORT")]
    destination_port: Option<u16>,

    /// Upper bound of one source read, and so of one frame.
    #[arg(long, env = "CTP_MAX_FRAME_SIZE")]
    max_frame_size: Option<usize>,

    /// Number of destination slots.  Connections beyond this are closed.
    #[arg(long, env = "CTP_DESTINATION_CAPACITY")]
    destination_capacity: Option<usize>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "CTP_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file (if any), applies CLI overrides, and validates
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if the
    /// merged configuration is invalid.
    fn into_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(port) = self.source_port {
            config.network.source_port = port;
        }
        if let Some(port) = self.destination_port {
            config.network.destination_port = port;
        }
        if let Some(size) = self.max_frame_size {
            config.limits.max_frame_size = size;
        }
        if let Some(capacity) = self.destination_capacity {
            config.limits.destination_capacity = capacity;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate().context("invalid relay configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    init_tracing(&config.log_level)?;

    let server = RelayServer::bind(&config)
        .await
        .context("failed to start relay listeners")?;

    info!(
        source = %server.source_addr()?,
        destination = %server.destination_addr()?,
        capacity = config.limits.destination_capacity,
        max_frame_size = config.limits.max_frame_size,
        "CTP relay ready"
    );

    server.run(TracingEventSink::new()).await;

    info!("CTP relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cli() -> Cli {
        Cli {
            config: None,
            bind: None,
            source_port: None,
            destination_port: None,
            max_frame_size: None,
            destination_capacity: None,
            log_level: None,
        }
    }

    #[test]
    fn test_cli_without_flags_yields_default_config() {
        // Arrange
        let cli = empty_cli();

        // Act
        let config = cli.into_config().unwrap();

        // Assert
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_cli_source_port_override() {
        let cli = Cli::parse_from(["ctp-relay", "--source-port", "9000"]);
        assert_eq!(cli.source_port, Some(9000));
    }

    #[test]
    fn test_cli_destination_port_override() {
        let cli = Cli::parse_from(["ctp-relay", "--destination-port", "9001"]);
        assert_eq!(cli.destination_port, Some(9001));
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["ctp-relay", "--bind", "127.0.0.1"]);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_into_config_applies_every_override() {
        // Arrange
        let cli = Cli {
            bind: Some("127.0.0.1".to_string()),
            source_port: Some(1000),
            destination_port: Some(2000),
            max_frame_size: Some(1500),
            destination_capacity: Some(3),
            log_level: Some("debug".to_string()),
            ..empty_cli()
        };

        // Act
        let config = cli.into_config().unwrap();

        // Assert
        assert_eq!(config.network.bind_address, "127.0.0.1");
        assert_eq!(config.network.source_port, 1000);
        assert_eq!(config.network.destination_port, 2000);
        assert_eq!(config.limits.max_frame_size, 1500);
        assert_eq!(config.limits.destination_capacity, 3);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_into_config_missing_file_uses_defaults() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/ctp-relay/relay.toml")),
            ..empty_cli()
        };

        let config = cli.into_config().unwrap();

        assert_eq!(config.network.source_port, 33333);
    }

    #[test]
    fn test_into_config_cli_overrides_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("ctp_relay_cli_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(&path, "[network]\nsource_port = 7000\ndestination_port = 7001\n").unwrap();
        let cli = Cli {
            config: Some(path),
            source_port: Some(8000),
            ..empty_cli()
        };

        // Act
        let config = cli.into_config().unwrap();

        // Assert: flag wins, file value survives where no flag was given
        assert_eq!(config.network.source_port, 8000);
        assert_eq!(config.network.destination_port, 7001);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_into_config_invalid_bind_returns_error() {
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..empty_cli()
        };

        assert!(cli.into_config().is_err());
    }

    #[test]
    fn test_into_config_zero_capacity_returns_error() {
        let cli = Cli {
            destination_capacity: Some(0),
            ..empty_cli()
        };

        assert!(cli.into_config().is_err());
    }
}
