use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::bot::DEFAULT_WEBHOOK_URL;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub webhook_url: Option<String>,
    pub language: Option<String>,
    /// Recognizer command for voice input; unset means the capability is absent
    pub speech_command: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            webhook_url: Some(DEFAULT_WEBHOOK_URL.to_string()),
            language: None,
            speech_command: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_language(language: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.language = Some(language.to_string());
        config.save()
    }

    pub fn webhook_url(&self) -> &str {
        self.webhook_url.as_deref().unwrap_or(DEFAULT_WEBHOOK_URL)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatbot-cli").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.webhook_url(), DEFAULT_WEBHOOK_URL);
        assert!(config.speech_command.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.webhook_url = Some("http://example.test/webhook".to_string());
        config.language = Some("es".to_string());
        config.speech_command = Some("/usr/local/bin/listen".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.webhook_url(), "http://example.test/webhook");
        assert_eq!(loaded.language.as_deref(), Some("es"));
        assert_eq!(loaded.speech_command.as_deref(), Some("/usr/local/bin/listen"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
