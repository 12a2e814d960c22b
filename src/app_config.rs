//! Module for application configuration settings.
//!
//! User configurations may be specified in a configuration file.

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use std::path::{Path, PathBuf};

use spfs::cache::policy::PolicySpec;

fn spfs_data_dir() -> Option<PathBuf> {
    let data_dir = dirs::data_dir();
    if let Some(path) = data_dir {
        return Some(path.join("spfs"));
    }

    let home_dir = dirs::home_dir();
    if let Some(path) = home_dir {
        return Some(path.join(".local").join("share").join("spfs"));
    }

    None
}

fn default_root() -> PathBuf {
    spfs_data_dir().map_or_else(
        || PathBuf::from("/tmp/spfs/library"),
        |dir| dir.join("library"),
    )
}

fn default_username() -> String {
    "anonymous".to_owned()
}

fn default_service_url() -> String {
    "file://localhost".to_owned()
}

/// The account the library is accessed as.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountConfig {
    /// The URL of the library's site.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// The account's user name.
    #[serde(default = "default_username")]
    pub username: String,

    /// The account's password.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// The account's login domain, if the site requires one.
    #[serde(default)]
    pub domain: Option<String>,

    /// A destination equal to this alias means "use the source file's name".
    #[serde(default)]
    pub host_alias: Option<String>,
}

impl AccountConfig {
    /// The identity attribute cache entries are keyed under.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.username, self.service_url)
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            username: default_username(),
            password: None,
            domain: None,
            host_alias: None,
        }
    }
}

/// The attribute cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// The cache policy spec, e.g. `maximumSize=10000,expireAfterWrite=30s` or `disabled`.
    /// Blank or absent selects the default policy.
    #[serde(default)]
    pub spec: Option<String>,
}

/// Application configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// The local directory that stands in for the remote library.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: AccountConfig::default(),
            cache: CacheConfig::default(),
            root: default_root(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation errors: {0:?}")]
    ValidationErrors(Vec<String>),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns:
    /// - `Ok(())` if the configuration is valid.
    /// - `Err(Vec<String>)` containing a list of validation error messages otherwise.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.account.username.trim().is_empty() {
            errors.push("Account username must not be empty.".to_owned());
        }

        if self.account.service_url.trim().is_empty() {
            errors.push("Account service URL must not be empty.".to_owned());
        }

        if let Err(e) = PolicySpec::parse(self.cache.spec.as_deref()) {
            errors.push(format!("Invalid cache spec: {e}."));
        }

        if self.root.as_os_str().is_empty() {
            errors.push("Library root must not be empty.".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("spfs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("spfs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/spfs/config.toml"));

        paths
    }

    /// Finds the first existing config file from search paths.
    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads configuration from the first found config file, or the external path if given.
    pub fn load(external_config_path: Option<&Path>) -> Option<Result<Self, ConfigError>> {
        if let Some(path) = external_config_path {
            return Some(Self::load_from_file(path));
        }

        Self::find_config_file().map(|path| Self::load_from_file(&path))
    }

    /// Loads config, falling back to the defaults if no file exists.
    /// Errors if a config file exists but is malformed or invalid.
    pub fn load_or_default(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match Self::load(external_config_path) {
            Some(res) => res?,
            None => {
                debug!("No configuration file found, using defaults.");
                Self::default()
            }
        };
        config.validate().map_err(ConfigError::ValidationErrors)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            root = "/srv/library"

            [account]
            service-url = "https://example.sharepoint.com/sites/docs"
            username = "alice"
            password = "hunter2"
            host-alias = "docs"

            [cache]
            spec = "maximumSize=100,expireAfterWrite=5m"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.account.identity(),
            "alice@https://example.sharepoint.com/sites/docs"
        );
        assert_eq!(config.account.host_alias.as_deref(), Some("docs"));
        assert_eq!(config.root, PathBuf::from("/srv/library"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.spec, None);
        assert_eq!(config.account.username, "anonymous");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_cache_spec() {
        let config: Config = toml::from_str("[cache]\nspec = \"maximumSize=many\"").unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cache spec"), "{errors:?}");
    }
}
