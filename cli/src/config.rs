use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_FILE_NAME: &str = ".lightbulb.toml";

/// Settings read from `~/.lightbulb.toml` or `--config`. Every key is
/// optional; flags and environment variables take precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub include_tags: Option<Vec<String>>,
    pub skip_tags: Option<Vec<String>>,
    pub interactive: Option<bool>,
    pub work_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file '{}': {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_FILE_NAME))
}

/// Load the config file. An explicitly named file must exist; a missing
/// default file yields the empty config.
pub fn load(explicit: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok((FileConfig::default(), None)),
        },
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse(&text).map_err(|source| ConfigError::Toml {
        path: path.clone(),
        source,
    })?;
    Ok((config, Some(path)))
}

pub fn parse(text: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(text)
}
