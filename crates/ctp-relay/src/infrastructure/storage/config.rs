//! TOML config file loading.
//!
//! The relay never writes its config; it only reads the file named with
//! `--config` (or `CTP_CONFIG`).  A missing file is not an error: the relay
//! starts with [`RelayConfig::default`], which is the classic port layout.

use std::path::Path;

use crate::domain::config::{ConfigError, RelayConfig};

/// Loads the relay configuration from `path`.
///
/// Returns [`RelayConfig::default`] if the file does not exist.  Fields the
/// file omits keep their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
/// [`ConfigError::Parse`] if it is not valid TOML for the schema.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => RelayConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
