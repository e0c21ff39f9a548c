//! Layered settings: defaults, config files, environment.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Base name of the config file looked up in the working directory.
const LOCAL_CONFIG: &str = "chatterbox-studio";

/// Prefix for environment overrides, e.g. `CHATTERBOX_STUDIO__SERVER__PORT`.
const ENV_PREFIX: &str = "CHATTERBOX_STUDIO";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub backend: BackendSettings,
    pub output: OutputSettings,
    pub server: ServerSettings,
    pub model: ModelSettings,
}

/// Where the model host listens.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BackendSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputSettings {
    pub dir: PathBuf,
}

/// Web form bind address.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelSettings {
    /// `auto`, `cuda`, `mps` or `cpu`.
    pub device: String,
}

impl Settings {
    /// Load from the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load, adding `extra` (if given) as a required file on top of the
    /// default locations and below the environment.
    pub fn load_from(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("backend.url", "http://localhost:8081")?
            .set_default("output.dir", "outputs")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 7860)?
            .set_default("model.device", "auto")?
            .add_source(File::with_name(LOCAL_CONFIG).required(false));

        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("chatterbox-studio").join("config");
            builder = builder.add_source(File::from(user_config).required(false));
        }

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "backend.url must not be empty".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.model.device.parse::<crate::engine::DeviceSelection>().is_err() {
            return Err(ConfigError::Message(format!(
                "Invalid model.device: {}. Must be one of auto, cuda, mps, cpu",
                self.model.device
            )));
        }
        Ok(())
    }
}
