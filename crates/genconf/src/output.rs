//! Local-side configuration: where files land, the local engine, and logging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where generated audio is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, created on first write.
    /// Default: generated_audio (relative to the working directory)
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: PathBuf,

    /// Filename template. `{duration}` and `{slug}` are substituted per request.
    /// Default: generated_audio_{duration}s.wav
    #[serde(default = "OutputConfig::default_filename_template")]
    pub filename_template: String,
}

impl OutputConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("generated_audio")
    }

    fn default_filename_template() -> String {
        "generated_audio_{duration}s.wav".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            filename_template: Self::default_filename_template(),
        }
    }
}

/// Local inference engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Default: 44100
    #[serde(default = "LocalConfig::default_sample_rate")]
    pub sample_rate: u32,
}

impl LocalConfig {
    fn default_sample_rate() -> u32 {
        44_100
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::default_sample_rate(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or a full EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
