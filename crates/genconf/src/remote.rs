//! Network-facing configuration: the hosted inference API and the model hub.

use serde::{Deserialize, Serialize};

/// Hosted inference API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the prediction API.
    /// Default: https://api.replicate.com/v1
    #[serde(default = "RemoteConfig::default_api_base")]
    pub api_base: String,

    /// Model reference, `owner/name` or `owner/name:version`.
    #[serde(default = "RemoteConfig::default_model")]
    pub model: String,

    /// Submit through the deployment endpoint for `owner/name` instead of the model.
    #[serde(default)]
    pub deployment: bool,

    /// How long to wait for a prediction before giving up locally.
    /// Default: 600
    #[serde(default = "RemoteConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between status polls.
    /// Default: 1000
    #[serde(default = "RemoteConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl RemoteConfig {
    fn default_api_base() -> String {
        "https://api.replicate.com/v1".to_string()
    }

    fn default_model() -> String {
        "mgysel/stable-audio-open:8465bfb2f7a77991f33e26db02083f0ca21799e8325a124901549c5effb1945d"
            .to_string()
    }

    fn default_timeout_secs() -> u64 {
        600
    }

    fn default_poll_interval_ms() -> u64 {
        1000
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: Self::default_api_base(),
            model: Self::default_model(),
            deployment: false,
            timeout_secs: Self::default_timeout_secs(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

/// Model hub settings, used by the local path to authenticate for gated weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Default: https://huggingface.co
    #[serde(default = "HubConfig::default_endpoint")]
    pub endpoint: String,

    /// Gated model the local engine needs access to.
    #[serde(default = "HubConfig::default_model_id")]
    pub model_id: String,

    /// File probed to verify download access.
    #[serde(default = "HubConfig::default_config_file")]
    pub config_file: String,
}

impl HubConfig {
    fn default_endpoint() -> String {
        "https://huggingface.co".to_string()
    }

    fn default_model_id() -> String {
        "stabilityai/stable-audio-open-1.0".to_string()
    }

    fn default_config_file() -> String {
        "model_config.json".to_string()
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            model_id: Self::default_model_id(),
            config_file: Self::default_config_file(),
        }
    }
}
