//! Configuration management.
//!
//! Handles loading, saving, and validating the YAML configuration file
//! that carries the LLM credentials and pipeline tunables.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file location, relative to the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Placeholder value for unconfigured API keys.
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Translation API configuration.
    pub openai: ApiConfig,

    /// Translation behavior settings.
    pub translation: TranslationConfig,

    /// Web scraping settings.
    pub scraping: ScrapingConfig,

    /// LLM prompts.
    pub prompts: PromptsConfig,
}

/// API configuration for LLM endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key (required for translation).
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl ApiConfig {
    /// Checks if the API key is configured (not placeholder).
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != API_KEY_PLACEHOLDER
    }
}

/// Translation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Number of previous chunk pairs sent along as context.
    pub history_length: usize,

    /// Delay between API requests in seconds.
    pub delay_between_requests_sec: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            history_length: 2,
            delay_between_requests_sec: 0.5,
        }
    }
}

/// Web scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Site root that novel codes are resolved against.
    pub base_url: String,

    /// Delay between web requests in seconds.
    pub delay_between_requests_sec: f64,

    /// Maximum characters per chunk when splitting episode text.
    pub chunk_size_chars: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ncode.syosetu.com".to_string(),
            delay_between_requests_sec: 1.0,
            chunk_size_chars: 2000,
        }
    }
}

/// LLM system prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Prompt for title translation.
    pub title_translation: String,

    /// Prompt for content translation.
    pub content_translation: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            title_translation: "You are a Japanese to English translator. Translate the following Japanese web novel title to English. Provide only the translated title, nothing else.".to_string(),
            content_translation: "You are a Japanese to English translator specializing in web novels. Translate the following Japanese text to natural English, preserving the author's style and tone. Keep one English paragraph per Japanese line. Provide only the translation.".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a specific path.
    ///
    /// A missing file is created from the defaults so the user has a
    /// template to put the API key into.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// The API key is only checked when the translate stage will run.
    pub fn validate(&self, require_api_key: bool) -> Result<(), ConfigError> {
        if require_api_key && !self.openai.is_configured() {
            return Err(ConfigError::MissingValue(
                "openai.api_key (set your API key in config file)".to_string(),
            ));
        }

        if self.scraping.chunk_size_chars == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scraping.chunk_size_chars".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        check_delay(
            "translation.delay_between_requests_sec",
            self.translation.delay_between_requests_sec,
        )?;
        check_delay(
            "scraping.delay_between_requests_sec",
            self.scraping.delay_between_requests_sec,
        )?;

        Ok(())
    }
}

/// Longest delay accepted between requests, in seconds.
pub const MAX_DELAY_SEC: f64 = 3600.0;

/// Delays feed `Duration::from_secs_f64`, which panics on non-finite values.
fn check_delay(key: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=MAX_DELAY_SEC).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be between 0 and {} seconds", MAX_DELAY_SEC),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.openai.is_configured());
        assert_eq!(config.scraping.chunk_size_chars, 2000);
        assert_eq!(config.scraping.base_url, "https://ncode.syosetu.com");
        assert_eq!(config.translation.history_length, 2);
    }

    #[test]
    fn test_api_configured_check() {
        let mut api = ApiConfig::default();
        assert!(!api.is_configured());

        api.api_key = "sk-real-key".to_string();
        assert!(api.is_configured());

        api.api_key = String::new();
        assert!(!api.is_configured());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = Config::from_yaml("openai:\n  api_key: sk-abc\n").unwrap();
        assert_eq!(config.openai.api_key, "sk-abc");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.scraping.delay_between_requests_sec, 1.0);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = Config::from_yaml("openai: [unterminated");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_creates_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("config.yaml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(!config.openai.is_configured());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(API_KEY_PLACEHOLDER));
    }

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.openai.api_key = "sk-saved".to_string();
        config.scraping.chunk_size_chars = 1234;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.openai.api_key, "sk-saved");
        assert_eq!(loaded.scraping.chunk_size_chars, 1234);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate(true).is_err());
        assert!(config.validate(false).is_ok());

        let mut config = Config::default();
        config.openai.api_key = "real-key".to_string();
        assert!(config.validate(true).is_ok());

        config.scraping.chunk_size_chars = 0;
        assert!(matches!(
            config.validate(true),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_delays_must_be_finite_and_bounded() {
        for delay in [-0.5, f64::INFINITY, f64::NAN, 1e12, MAX_DELAY_SEC + 1.0] {
            let mut config = Config::default();
            config.translation.delay_between_requests_sec = delay;
            assert!(
                matches!(
                    config.validate(false),
                    Err(ConfigError::InvalidValue { ref key, .. }) if key == "translation.delay_between_requests_sec"
                ),
                "should reject translation delay {}",
                delay
            );

            let mut config = Config::default();
            config.scraping.delay_between_requests_sec = delay;
            assert!(config.validate(false).is_err(), "should reject scraping delay {}", delay);
        }

        let mut config = Config::default();
        config.scraping.delay_between_requests_sec = MAX_DELAY_SEC;
        config.translation.delay_between_requests_sec = 0.0;
        assert!(config.validate(false).is_ok());

        let config = Config::from_yaml("scraping:\n  delay_between_requests_sec: .inf\n").unwrap();
        assert!(config.validate(false).is_err());
    }
}
