use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_DB_PATH: &str = "urls.db";
const DEFAULT_SHORT_LENGTH: usize = 6;
const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
const MAX_SHORT_LENGTH: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("short_length must be between 1 and 64, got {0}")]
    InvalidShortLength(usize),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub db_path: PathBuf,
    pub short_length: usize,
    pub server_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            db_path: DEFAULT_DB_PATH.into(),
            short_length: DEFAULT_SHORT_LENGTH,
            server_address: DEFAULT_SERVER_ADDRESS.into(),
        }
    }
}

impl Config {
    /// Defaults, then the JSON config file, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let mut config = Self::from_file(&path);
        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults, so does a malformed one (with a warning).
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let Ok(text) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            tracing::warn!(
                "Error reading config file {}: {}. Using defaults",
                path.display(),
                err
            );
            Self::default()
        })
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(db_path) = lookup("DB_PATH") {
            self.db_path = db_path.into();
        }
        if let Some(value) = lookup("SHORT_LENGTH") {
            self.short_length = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "SHORT_LENGTH".into(),
                value,
            })?;
        }
        if let Some(address) = lookup("SERVER_ADDRESS") {
            self.server_address = address;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT".into(),
                value: port,
            })?;
            self.server_address = format!("0.0.0.0:{port}");
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if !(1..=MAX_SHORT_LENGTH).contains(&self.short_length) {
            return Err(ConfigError::InvalidShortLength(self.short_length));
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup<'a>(vars: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| vars.get(name).map(|value| value.to_string())
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_file("/definitely/not/here.json");
        assert_eq!(config, Config::default());
        assert_eq!(config.short_length, 6);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "https://sho.rt", "short_length": 8}}"#).unwrap();

        let config = Config::from_file(file.path());
        assert_eq!(config.base_url, "https://sho.rt");
        assert_eq!(config.short_length, 8);
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(Config::from_file(file.path()), Config::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config {
            base_url: "https://from.file".into(),
            db_path: "file.db".into(),
            short_length: 8,
            server_address: "127.0.0.1:1".into(),
        };
        let vars = HashMap::from([
            ("BASE_URL", "https://from.env/"),
            ("DB_PATH", "/data/env.db"),
            ("SHORT_LENGTH", "10"),
            ("PORT", "9090"),
        ]);
        config.apply_env(lookup(&vars)).unwrap();
        config.validate().unwrap();

        assert_eq!(config.base_url, "https://from.env");
        assert_eq!(config.db_path, PathBuf::from("/data/env.db"));
        assert_eq!(config.short_length, 10);
        assert_eq!(config.server_address, "0.0.0.0:9090");
    }

    #[test]
    fn test_server_address_wins_over_port() {
        let mut config = Config::default();
        let vars = HashMap::from([("SERVER_ADDRESS", "127.0.0.1:3000"), ("PORT", "9090")]);
        config.apply_env(lookup(&vars)).unwrap();
        assert_eq!(config.server_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_env_values() {
        let vars = HashMap::from([("SHORT_LENGTH", "six")]);
        assert!(matches!(
            Config::default().apply_env(lookup(&vars)),
            Err(ConfigError::InvalidEnv { name, .. }) if name == "SHORT_LENGTH"
        ));

        let vars = HashMap::from([("PORT", "99999")]);
        assert!(Config::default().apply_env(lookup(&vars)).is_err());
    }

    #[test]
    fn test_short_length_bounds() {
        let mut config = Config {
            short_length: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidShortLength(0))
        ));

        config.short_length = MAX_SHORT_LENGTH + 1;
        assert!(config.validate().is_err());
    }
}
