//! Configuration for the IVR flow execution engine
//!
//! Settings load from an optional TOML file overlaid with environment
//! variables under the `IVR_ENGINE_` prefix (`IVR_ENGINE_API__TIMEOUT_SECS`
//! and so on). Every field has a default, so a bare environment runs with
//! the values the production deployment has always used.

pub mod settings;

pub use settings::{
    load_settings, ApiSettings, CollectSettings, PlaybackSettings, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
