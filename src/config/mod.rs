// SPDX-License-Identifier: MIT

//! Configuration management for Visor

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory holding the catalogued images
    pub images_dir: String,

    /// Image extensions shown in the gallery (lowercase, no dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Reverse-image-search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API subscription key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png"].into_iter().map(String::from).collect()
}
fn default_search_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/images/visualsearch".to_string()
}
fn default_api_key_env() -> String { "VISOR_SEARCH_API_KEY".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_db_path() -> String { "visor.db".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            images_dir: "./images".to_string(),
            extensions: default_extensions(),
            search: SearchConfig::default(),
            web: WebConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::VisorError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.extensions, vec!["jpg", "jpeg", "png"]);
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.database.path, "visor.db");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/visor.json")).unwrap();
        assert_eq!(config.images_dir, "./images");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.images_dir = "/srv/paintings".to_string();
        config.web.port = 9000;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.images_dir, "/srv/paintings");
        assert_eq!(loaded.web.port, 9000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"images_dir": "/data/art"}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.images_dir, "/data/art");
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.search.timeout_secs, 30);
    }
}
