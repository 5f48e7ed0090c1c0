//! Config file discovery, loading, and environment variable overlay.

use crate::{AudiogenConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

const SYSTEM_CONFIG: &str = "/etc/audiogen/config.toml";
const USER_CONFIG: &str = "audiogen/config.toml";
const LOCAL_CONFIG: &str = "audiogen.toml";

/// Existing config files in load order: system, user, then local.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Like [`discover_config_files`], with `cli_path` standing in for the
/// local file when it exists.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let user = directories::BaseDirs::new().map(|d| d.config_dir().join(USER_CONFIG));
    let local = match cli_path {
        Some(path) if path.exists() => path.to_path_buf(),
        _ => PathBuf::from(LOCAL_CONFIG),
    };

    [Some(PathBuf::from(SYSTEM_CONFIG)), user, Some(local)]
        .into_iter()
        .flatten()
        .filter(|p| p.exists())
        .collect()
}

/// Read and parse a TOML file into a raw table.
///
/// The table is also checked against the config schema so a bad value is
/// reported against the file it came from, not the merged result.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let table = parse_table(&contents, path)?;
    from_table(table.clone(), path)?;
    Ok(table)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deserialize a merged table, filling gaps with compiled defaults.
pub fn from_table(table: toml::Table, path: &Path) -> Result<AudiogenConfig, ConfigError> {
    let mut config: AudiogenConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    config.output.dir = expand_path(&config.output.dir.to_string_lossy());
    Ok(config)
}

/// Merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `AUDIOGEN_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut AudiogenConfig, sources: &mut ConfigSources) {
    apply_overrides(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup. Unparseable numeric values are ignored.
pub fn apply_overrides<F>(config: &mut AudiogenConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut take = |key: &str| {
        let value = lookup(key);
        if value.is_some() {
            sources.env_overrides.push(key.to_string());
        }
        value
    };

    // Remote
    if let Some(v) = take("AUDIOGEN_API_BASE") {
        config.remote.api_base = v;
    }
    if let Some(v) = take("AUDIOGEN_MODEL") {
        config.remote.model = v;
    }
    if let Some(v) = take("AUDIOGEN_DEPLOYMENT") {
        config.remote.deployment = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = take("AUDIOGEN_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse() {
            config.remote.timeout_secs = secs;
        }
    }
    if let Some(v) = take("AUDIOGEN_POLL_INTERVAL_MS") {
        if let Ok(ms) = v.parse() {
            config.remote.poll_interval_ms = ms;
        }
    }

    // Output
    if let Some(v) = take("AUDIOGEN_OUTPUT_DIR") {
        config.output.dir = expand_path(&v);
    }
    if let Some(v) = take("AUDIOGEN_FILENAME_TEMPLATE") {
        config.output.filename_template = v;
    }

    // Hub
    if let Some(v) = take("AUDIOGEN_HUB_ENDPOINT") {
        config.hub.endpoint = v;
    }
    if let Some(v) = take("AUDIOGEN_HUB_MODEL") {
        config.hub.model_id = v;
    }

    // Local engine
    if let Some(v) = take("AUDIOGEN_SAMPLE_RATE") {
        if let Ok(rate) = v.parse() {
            config.local.sample_rate = rate;
        }
    }

    if let Some(v) = take("AUDIOGEN_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
}

/// Expand a leading `~/` or `$VAR` in a path. Unknown variables are left as written.
pub fn expand_path(path: &str) -> PathBuf {
    expand_path_with(path, |var| env::var(var).ok())
}

fn expand_path_with<F>(path: &str, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(rest) = path.strip_prefix("~/") {
        return match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => PathBuf::from(path),
        };
    }

    let Some(var_path) = path.strip_prefix('$') else {
        return PathBuf::from(path);
    };
    let (var, rest) = var_path.split_once('/').unwrap_or((var_path, ""));
    match lookup(var) {
        Some(value) if rest.is_empty() => PathBuf::from(value),
        Some(value) => PathBuf::from(value).join(rest),
        None => PathBuf::from(path),
    }
}
