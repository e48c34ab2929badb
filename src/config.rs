use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub models: Option<ModelsSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub influx: Option<InfluxSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsSection {
    /// Directory holding the exported model artifacts.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSection {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    /// Connect/read/write timeout for sink writes in seconds (default: 5)
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the model artifact directory (default: `models`).
    pub fn models_dir(&self) -> PathBuf {
        self.models
            .as_ref()
            .and_then(|s| s.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR))
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the Influx sink settings, or None if persistence is disabled.
    pub fn influx(&self) -> Option<&InfluxSection> {
        self.influx.as_ref()
    }

    /// Returns the sink write timeout as Duration (default: 5 seconds)
    pub fn sink_timeout(&self) -> Duration {
        let secs = self
            .influx
            .as_ref()
            .and_then(|s| s.timeout_secs)
            .unwrap_or(DEFAULT_SINK_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}
