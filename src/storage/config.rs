use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub backend: BackendConfig,
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    pub base_column_width: f64,
    pub lane_width_increment: f64,
    pub first_hour: u32,
    pub last_hour: u32,
    pub first_day_of_week: String,
}

impl GridConfig {
    pub fn first_weekday(&self) -> Weekday {
        self.first_day_of_week.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown first_day_of_week '{}', using Monday",
                self.first_day_of_week
            );
            Weekday::Mon
        })
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            base_column_width: 140.0,
            lane_width_increment: 70.0,
            first_hour: 6,
            last_hour: 22,
            first_day_of_week: "Monday".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::config_path())
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("academy-calendar")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8000/api".to_string(),
                api_token: None,
                timeout_secs: 15,
            },
            grid: GridConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_points_at_local_backend() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:8000/api");
        assert_eq!(config.backend.api_token, None);
    }

    #[test]
    fn default_grid_starts_on_monday() {
        let config = Config::default();
        assert_eq!(config.grid.first_weekday(), Weekday::Mon);
    }

    #[test]
    fn unknown_first_day_falls_back_to_monday() {
        let grid = GridConfig {
            first_day_of_week: "Someday".to_string(),
            ..GridConfig::default()
        };
        assert_eq!(grid.first_weekday(), Weekday::Mon);
    }

    #[test]
    fn parse_valid_toml_config() {
        let toml_content = r#"
            [backend]
            base_url = "https://academy.example.com/api"
            api_token = "secret"
            timeout_secs = 30

            [grid]
            base_column_width = 160.0
            lane_width_increment = 80.0
            first_hour = 7
            last_hour = 21
            first_day_of_week = "Sunday"
        "#;

        let config = Config::from_toml(toml_content).unwrap();

        assert_eq!(config.backend.base_url, "https://academy.example.com/api");
        assert_eq!(config.backend.api_token.as_deref(), Some("secret"));
        assert_eq!(config.grid.lane_width_increment, 80.0);
        assert_eq!(config.grid.first_weekday(), Weekday::Sun);
    }

    #[test]
    fn api_token_is_optional() {
        let toml_content = r#"
            [backend]
            base_url = "http://localhost:8000/api"
            timeout_secs = 10

            [grid]
            base_column_width = 140.0
            lane_width_increment = 70.0
            first_hour = 6
            last_hour = 22
            first_day_of_week = "Monday"
        "#;

        let config = Config::from_toml(toml_content).unwrap();

        assert_eq!(config.backend.api_token, None);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = Config::from_toml("this is not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_or_create_at(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn saved_config_is_loaded_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.backend.api_token = Some("token".to_string());
        config.grid.first_hour = 8;

        config.save_to(&path).unwrap();
        let loaded = Config::load_or_create_at(&path).unwrap();

        assert_eq!(loaded, config);
    }
}
