//! Configuration management for mangadl.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories. Command-line flags are layered
//! on top of these values in `main`.

use crate::disambiguation::SameChapterPolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "mangadl";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog API settings.
    pub catalog: CatalogConfig,

    /// Download and packaging behavior.
    pub download: DownloadConfig,

    /// Preferred releases for same numbered chapters.
    pub preferences: PreferencesConfig,
}

/// Catalog API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL for the API.
    pub api_base: String,

    /// Request timeout in seconds.
    pub timeout_sec: u64,

    /// Enable catalog debug logging.
    pub debug: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.mangadex.org".to_string(),
            timeout_sec: 30,
            debug: false,
        }
    }
}

/// Download behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Translated language code to download.
    pub language: String,

    /// Directory that receives one folder per manga title.
    pub output_directory: PathBuf,

    /// Delay after every page request in seconds (5 requests/sec limit).
    pub delay_between_pages_sec: f64,

    /// Wait before the single retry of a failed page in seconds.
    pub retry_backoff_sec: f64,

    /// Download reduced-quality images.
    pub data_saver: bool,

    /// Package every unit into a .cbz archive.
    pub archive: bool,

    /// Policy for same numbered chapters not matched by a preference.
    /// Unset means `all` for chapters and `last` for volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_chapter: Option<SameChapterPolicy>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            output_directory: PathBuf::from("download"),
            delay_between_pages_sec: 0.2,
            retry_backoff_sec: 2.0,
            data_saver: false,
            archive: false,
            same_chapter: None,
        }
    }
}

/// Preferred uploaders and scanlation groups, in priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Scanlation group names.
    pub groups: Vec<String>,

    /// Uploader user names.
    pub users: Vec<String>,
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.catalog.api_base).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "catalog.api_base".to_string(),
                message: format!("'{}' is not a valid URL", self.catalog.api_base),
            });
        }

        if self.download.language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "download.language".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        for (key, value) in [
            (
                "download.delay_between_pages_sec",
                self.download.delay_between_pages_sec,
            ),
            ("download.retry_backoff_sec", self.download.retry_backoff_sec),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be a non-negative number".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the policy to apply, defaulting by selection mode.
    pub fn same_chapter_policy(&self, volumes: bool) -> SameChapterPolicy {
        self.download.same_chapter.unwrap_or(if volumes {
            SameChapterPolicy::Last
        } else {
            SameChapterPolicy::All
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.download.language, "en");
        assert_eq!(config.download.output_directory, PathBuf::from("download"));
        assert_eq!(config.download.delay_between_pages_sec, 0.2);
        assert!(config.preferences.groups.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.preferences.groups = vec!["GroupA".to_string()];
        config.download.same_chapter = Some(SameChapterPolicy::Ask);
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.catalog.api_base, config.catalog.api_base);
        assert_eq!(loaded.preferences.groups, vec!["GroupA".to_string()]);
        assert_eq!(loaded.download.same_chapter, Some(SameChapterPolicy::Ask));
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.download.retry_backoff_sec, 2.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "[download]\nlanguage = \"fr\"\nsame_chapter = \"first\"\n",
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.download.language, "fr");
        assert_eq!(config.download.same_chapter, Some(SameChapterPolicy::First));
        assert_eq!(config.catalog.timeout_sec, 30);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.download.delay_between_pages_sec = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.catalog.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.language = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_defaults_by_mode() {
        let mut config = Config::default();
        assert_eq!(config.same_chapter_policy(false), SameChapterPolicy::All);
        assert_eq!(config.same_chapter_policy(true), SameChapterPolicy::Last);

        config.download.same_chapter = Some(SameChapterPolicy::First);
        assert_eq!(config.same_chapter_policy(true), SameChapterPolicy::First);
    }
}
