use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub manual_events_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub ttl_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            manual_events_path: PathBuf::from("manual_events.json"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache.json"),
            ttl_seconds: 60 * 60 * 6,
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory. A missing file yields
    /// the defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = match fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(ScraperError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path, e
                )))
            }
        };

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_seconds, 21600);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.manual_events_path, PathBuf::from("manual_events.json"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[cache]\nttl_seconds = 60\n").unwrap();
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.path, PathBuf::from("cache.json"));
        assert_eq!(config.server.allowed_origins.len(), 2);
    }
}
