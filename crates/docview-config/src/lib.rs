use docview_engine::ViewOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Document opened when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
    /// TOML decoration set laid over the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorations_path: Option<PathBuf>,
    #[serde(default)]
    pub view: ViewOptions,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the configured paths
        config.document_path = config.document_path.map(Self::expand_or_keep);
        config.decorations_path = config.decorations_path.map(Self::expand_or_keep);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/docview");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Expands `~` and `$VARS`, keeping the path as written when a variable
    /// is unset.
    fn expand_or_keep(path: PathBuf) -> PathBuf {
        let expanded = match shellexpand::full(&path.to_string_lossy()) {
            Ok(expanded) => Some(expanded.into_owned()),
            Err(e) => {
                log::warn!("Keeping {} unexpanded: {e}", path.display());
                None
            }
        };
        expanded.map_or(path, PathBuf::from)
    }
}
