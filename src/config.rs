//! Manager configuration.
//!
//! Precedence is environment > TOML file > defaults. The file is optional;
//! by default it is looked up as `config.toml` in the platform config dir.
//!
//! ```toml
//! debounce_ms = 150
//! default_tab = "all"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Debounce window for search-term URL updates.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

pub const ENV_DEBOUNCE_MS: &str = "SEARCH_URL_DEBOUNCE_MS";
pub const ENV_DEFAULT_TAB: &str = "SEARCH_URL_DEFAULT_TAB";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config TOML: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub debounce_ms: Option<u64>,
    pub default_tab: Option<String>,
}

/// Resolved configuration for a [`crate::manager::SearchUrlManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Quiet period before a search-term change is written to the URL.
    pub debounce: Duration,
    /// Tab identifier treated as "no tab" and omitted from the URL.
    pub default_tab: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            default_tab: None,
        }
    }
}

impl ManagerConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_default_tab(mut self, tab: impl Into<String>) -> Self {
        let tab = tab.into();
        self.default_tab = (!tab.is_empty()).then_some(tab);
        self
    }

    /// Defaults overlaid with the environment (a `.env` file is honored).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env(|key| dotenvy::var(key).ok())?;
        Ok(cfg)
    }

    /// Defaults, then the config file (explicit path, or the default path
    /// if it exists), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let path = path.map(Path::to_path_buf).or_else(|| {
            let default = default_config_path();
            default.exists().then_some(default)
        });
        if let Some(path) = path {
            let content = std::fs::read_to_string(&path).map_err(|source| {
                ConfigError::ReadFile {
                    path: path.clone(),
                    source,
                }
            })?;
            cfg.apply_file(toml::from_str(&content)?);
            debug!(path = %path.display(), "loaded config file");
        }
        cfg.apply_env(|key| dotenvy::var(key).ok())?;
        Ok(cfg)
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(ms) = file.debounce_ms {
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(tab) = file.default_tab {
            self.default_tab = (!tab.is_empty()).then_some(tab);
        }
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_DEBOUNCE_MS) {
            let ms = val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_DEBOUNCE_MS,
                value: val.clone(),
            })?;
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(tab) = lookup(ENV_DEFAULT_TAB) {
            self.default_tab = (!tab.is_empty()).then_some(tab);
        }
        Ok(())
    }
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "search-url-state", "search-url-state").map_or_else(
        || PathBuf::from("search-url.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.debounce, Duration::from_millis(100));
        assert!(cfg.default_tab.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = ManagerConfig::default();
        cfg.apply_file(ConfigFile {
            debounce_ms: Some(250),
            default_tab: Some("all".into()),
        });
        let env = HashMap::from([(ENV_DEFAULT_TAB, "articles")]);
        cfg.apply_env(lookup(&env)).unwrap();
        assert_eq!(cfg.debounce, Duration::from_millis(250));
        assert_eq!(cfg.default_tab.as_deref(), Some("articles"));
    }

    #[test]
    fn invalid_env_debounce_is_rejected() {
        let env = HashMap::from([(ENV_DEBOUNCE_MS, "soon")]);
        let err = ManagerConfig::default().apply_env(lookup(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key, .. } if key == ENV_DEBOUNCE_MS));
    }

    #[test]
    fn empty_default_tab_means_none() {
        let cfg = ManagerConfig::default().with_default_tab("");
        assert!(cfg.default_tab.is_none());
    }

    #[test]
    fn file_parses_and_rejects_unknown_keys() {
        let file: ConfigFile = toml::from_str("debounce_ms = 40\ndefault_tab = \"all\"").unwrap();
        assert_eq!(file.debounce_ms, Some(40));
        assert!(toml::from_str::<ConfigFile>("debounce = 40").is_err());
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = 10\n").unwrap();
        let cfg = ManagerConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.debounce, Duration::from_millis(10));
    }

    #[test]
    fn load_reports_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManagerConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
