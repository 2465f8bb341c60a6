//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ConfigError;

/// Playback timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Hard ceiling on a single playback. Prompts are short; a playback
    /// that has not finished by now has lost its finished event.
    #[serde(default = "default_playback_ceiling_secs")]
    pub ceiling_secs: u64,

    /// Pause after answering before the first node runs, so early audio
    /// is not clipped while the leg settles.
    #[serde(default = "default_answer_settle_ms")]
    pub answer_settle_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            ceiling_secs: default_playback_ceiling_secs(),
            answer_settle_ms: default_answer_settle_ms(),
        }
    }
}

/// Defaults applied to `collect` nodes that leave fields unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectSettings {
    #[serde(default = "default_max_digits")]
    pub max_digits: usize,

    /// Inactivity timeout between digits, in seconds.
    #[serde(default = "default_collect_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_terminators")]
    pub terminators: String,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            max_digits: default_max_digits(),
            timeout_secs: default_collect_timeout_secs(),
            terminators: default_terminators(),
        }
    }
}

/// Settings for `api_call` nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Fixed per-request timeout in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { timeout_secs: default_api_timeout_secs() }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default flow language when the flow config does not carry one.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub collect: CollectSettings,

    #[serde(default)]
    pub api: ApiSettings,

    /// Base URL of the platform API (call-log sink, outbound-call tracker).
    #[serde(default = "default_platform_api_url")]
    pub platform_api_url: String,

    /// Extra variables seeded into every call's variable bag, typically
    /// service base URLs that flows interpolate into api_call URLs.
    #[serde(default = "default_seed_variables")]
    pub seed_variables: HashMap<String, String>,
}

// in-code defaults are the same values serde fills in for an empty file
impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            playback: PlaybackSettings::default(),
            collect: CollectSettings::default(),
            api: ApiSettings::default(),
            platform_api_url: default_platform_api_url(),
            seed_variables: default_seed_variables(),
        }
    }
}

fn default_language() -> String {
    "ar".to_string()
}

fn default_playback_ceiling_secs() -> u64 {
    15
}

fn default_answer_settle_ms() -> u64 {
    500
}

fn default_max_digits() -> usize {
    10
}

fn default_collect_timeout_secs() -> u64 {
    10
}

fn default_terminators() -> String {
    "#".to_string()
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_platform_api_url() -> String {
    "http://platform-api:3001".to_string()
}

fn default_seed_variables() -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert(
        "BALANCE_API_URL".to_string(),
        "http://balance-api:3000".to_string(),
    );
    vars
}

/// Load settings from an optional file plus `IVR_ENGINE_` environment
/// overrides. `__` separates nesting levels in variable names.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("IVR_ENGINE").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
