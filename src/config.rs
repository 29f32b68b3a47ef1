//! Bake configuration: the shared mapping every stage reads and writes, and
//! the loader that produces it.
//!
//! The loader accepts either an already-built mapping or a path. A path that
//! cannot be read is not fatal: the bundled `bakery.defaults.yaml` is used
//! instead and a warning is returned alongside the configuration.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::ConfigError;

/// File name of the bundled default configuration.
pub const DEFAULTS_ASSET: &str = "bakery.defaults.yaml";

/// Name of the per-project configuration file looked up by the CLI.
pub const PROJECT_CONFIG_FILE: &str = "bakery.yaml";

/// Warning recorded when the requested configuration could not be read.
pub const FALLBACK_WARNING: &str = "Cannot read configuration file. Using defaults";

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct Assets;

/// Insertion-ordered mapping of configuration keys to arbitrary YAML values.
///
/// Serializes as a plain YAML mapping, so a checkpoint written from it can be
/// loaded back as the configuration of a later build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BakeConfig(Mapping);

impl BakeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    /// Parse YAML text. `origin` names the document in error messages.
    ///
    /// An empty document is an empty configuration.
    pub fn from_yaml(origin: &str, text: &[u8]) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_slice(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        match value {
            Value::Null => Ok(Self::new()),
            Value::Mapping(mapping) => Ok(Self(mapping)),
            _ => Err(ConfigError::NotAMapping {
                origin: origin.to_string(),
            }),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// String value for `key`. Null, missing and non-string values are `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Sequence of strings for `key`. A single string is treated as a
    /// one-element list; non-string items are skipped.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Insert or replace `key`. Replacing keeps the key's original position.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::String(key.to_string()), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(Value::as_str)
    }
}

/// Where a build's configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// An already-parsed mapping, used as-is.
    Mapping(BakeConfig),
    /// A YAML file; unreadable paths fall back to the bundled defaults.
    Path(PathBuf),
}

impl From<BakeConfig> for ConfigSource {
    fn from(config: BakeConfig) -> Self {
        Self::Mapping(config)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// Result of loading a configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: BakeConfig,
    /// Set when the requested file could not be read and defaults were used.
    pub warning: Option<String>,
}

/// Load a configuration from `source`.
///
/// Never fails because a path is missing or unreadable; fails only when the
/// content that was read is not a YAML mapping.
pub fn load_config(source: ConfigSource) -> Result<ConfigLoad, ConfigError> {
    match source {
        ConfigSource::Mapping(config) => Ok(ConfigLoad {
            config,
            warning: None,
        }),
        ConfigSource::Path(path) => match fs::read(&path) {
            Ok(bytes) => Ok(ConfigLoad {
                config: BakeConfig::from_yaml(&path.display().to_string(), &bytes)?,
                warning: None,
            }),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "configuration unreadable, falling back to bundled defaults"
                );
                Ok(ConfigLoad {
                    config: default_config()?,
                    warning: Some(FALLBACK_WARNING.to_string()),
                })
            }
        },
    }
}

/// Raw text of the bundled default configuration.
pub fn default_config_text() -> Result<Cow<'static, [u8]>, ConfigError> {
    Assets::get(DEFAULTS_ASSET)
        .map(|file| file.data)
        .ok_or(ConfigError::MissingDefaults(DEFAULTS_ASSET))
}

/// The bundled default configuration, parsed.
pub fn default_config() -> Result<BakeConfig, ConfigError> {
    let text = default_config_text()?;
    BakeConfig::from_yaml(DEFAULTS_ASSET, &text)
}
