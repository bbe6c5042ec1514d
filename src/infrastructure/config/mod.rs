//! Client configuration from environment variables and a mounted file.
//!
//! # Data Flow
//! ```text
//! ENV_PREFIX + process environment ──┐
//!                                    ├─ source.rs (flat, case-insensitive map)
//! CONFIG_DIR/CONFIG_NAME.toml ───────┘        │  environment overrides file
//!                                             ▼
//!                                  loader.rs (RwType key suffix, host/port pairing,
//!                                             timeouts, guard settings)
//!                                             ▼
//!                                          Options
//! ```

pub mod loader;
pub mod options;
pub mod source;

pub use loader::build_options;
pub use options::{ClientType, Options, RwType};
pub use source::{ParamSource, ParamValue};

use std::path::PathBuf;

/// Error type for configuration assembly.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("no redis hosts configured")]
    MissingHosts,
}

/// Options from environment variables only.
pub fn options_from_env(rw: RwType) -> Result<Options, ConfigError> {
    build_options(&ParamSource::from_env(), rw)
}

/// Options from the mounted volume file only.
pub fn options_from_volume(rw: RwType) -> Result<Options, ConfigError> {
    build_options(&ParamSource::from_volume()?, rw)
}

/// Options from the volume file overridden by environment variables.
pub fn options_from_merged(rw: RwType) -> Result<Options, ConfigError> {
    build_options(&ParamSource::merged()?, rw)
}
