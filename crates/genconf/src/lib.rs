//! Configuration loading for audiogen.
//!
//! Kept dependency-light so the binary and the test harnesses can share it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use genconf::AudiogenConfig;
//!
//! let config = AudiogenConfig::load().expect("Failed to load config");
//!
//! println!("model: {}", config.remote.model);
//! println!("timeout: {}s", config.remote.timeout_secs);
//! println!("output: {}", config.output.dir.display());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/audiogen/config.toml` (system)
//! 2. `~/.config/audiogen/config.toml` (user)
//! 3. `./audiogen.toml` (local override, replaced by `--config PATH` when given)
//! 4. Environment variables (`AUDIOGEN_*`)
//!
//! Credentials never live in config files. They are read from the environment
//! by the binary and handed to the clients that need them.
//!
//! # Example Config
//!
//! ```toml
//! [remote]
//! model = "mgysel/stable-audio-open"
//! deployment = true
//! timeout_secs = 120
//!
//! [output]
//! dir = "~/audio/generated"
//! filename_template = "{slug}_{duration}s.wav"
//!
//! [telemetry]
//! log_level = "debug"
//! ```

pub mod loader;
pub mod output;
pub mod remote;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use output::{LocalConfig, OutputConfig, TelemetryConfig};
pub use remote::{HubConfig, RemoteConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete audiogen configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AudiogenConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AudiogenConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for `./audiogen.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_from_file(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Prediction deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.remote.poll_interval_ms)
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string(self).unwrap_or_else(|e| format!("# unserializable: {e}\n"));
        format!("# audiogen configuration\n\n{body}")
    }
}
