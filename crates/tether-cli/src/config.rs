//! Configuration management for the CLI
//!
//! This module handles loading configuration from:
//! - Default values
//! - Configuration files (TOML/YAML/JSON)
//! - Environment variables (see [`crate::logging`])

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tether_core::{ClientConfig, Endpoint, Request};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline settings shared by every request
    pub client: ClientConfig,

    /// Named endpoints addressable by `tether fetch <name>`
    pub endpoints: BTreeMap<String, EndpointConfig>,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// A named endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL; query items are appended to it
    pub url: String,

    /// Dedup window in seconds
    #[serde(default)]
    pub window_secs: f64,

    /// Per-attempt timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Headers sent with every request; values may reference `${ENV:NAME}`
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (compact, full, json)
    pub format: String,

    /// Log file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            file: None,
        }
    }
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            window_secs: 0.0,
            timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }

    /// Build the runtime endpoint, named after its configuration key
    pub fn to_endpoint(&self, name: &str) -> Result<Endpoint> {
        let window = Duration::try_from_secs_f64(self.window_secs).map_err(|_| {
            Error::config(format!(
                "endpoints.{}.window_secs must be a finite, non-negative number",
                name
            ))
        })?;

        let mut endpoint = Endpoint::new(name, self.url.clone()).with_window(window);
        if let Some(secs) = self.timeout_secs {
            endpoint = endpoint.with_timeout(Duration::from_secs(secs));
        }
        Ok(endpoint)
    }
}

impl Config {
    /// Configuration written by `tether config init`
    pub fn sample() -> Self {
        let mut example = EndpointConfig::new("https://httpbin.org/get");
        example.window_secs = 5.0;
        example.timeout_secs = Some(20);
        example
            .headers
            .insert("Accept".to_string(), "application/json".to_string());

        let mut config = Self::default();
        config.endpoints.insert("example".to_string(), example);
        config
    }

    /// Load configuration from a file, picking the format from its extension
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let config = match extension(path) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content).map_err(|e| {
                tracing::debug!(error = %e, "TOML parse failure");
                Error::InvalidFormat {
                    path: path.to_path_buf(),
                    expected: "TOML".to_string(),
                }
            })?,
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading configuration");
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        if let Some(path) = file {
            Self::from_file(path)
        } else {
            Self::load()
        }
    }

    /// User-level configuration file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tether").join("config.toml"))
    }

    /// Default configuration file paths, in lookup order
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("tether.toml"), PathBuf::from(".tether.toml")];
        paths.extend(Self::user_config_path());
        paths
    }

    /// Check every section, including endpoint URLs
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;

        for (name, endpoint) in &self.endpoints {
            let endpoint = endpoint.to_endpoint(name)?;
            Request::get(Arc::new(endpoint))
                .resolve()
                .map_err(|e| Error::config(format!("endpoints.{}.url: {}", name, e)))?;
        }

        match self.logging.format.as_str() {
            "compact" | "full" | "json" => Ok(()),
            other => Err(Error::config(format!("Unknown logging.format '{}'", other))),
        }
    }

    /// Serialize in the format picked from the extension of `path`
    pub fn render_for(&self, path: &Path) -> Result<String> {
        let content = match extension(path) {
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => self.to_toml()?,
        };
        Ok(content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(format!("Failed to serialize as TOML: {}", e)))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.render_for(path)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(
            &path,
            r#"
[client.retry]
max_attempts = 3
mode = "timer_only"

[client.retry.backoff]
type = "constant"
delay_secs = 2

[endpoints.users]
url = "https://api.example.com/users"
window_secs = 5
headers = { Authorization = "Bearer ${ENV:API_TOKEN}" }

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.client.retry.max_attempts, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "compact");

        let users = config.endpoints.get("users").unwrap();
        let endpoint = users.to_endpoint("users").unwrap();
        assert_eq!(endpoint.id().as_str(), "users");
        assert_eq!(endpoint.window(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/tether.toml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[client\nmax = ").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
    }

    #[test]
    fn test_save_and_reload_each_format() {
        let dir = TempDir::new().unwrap();
        let sample = Config::sample();

        for name in ["out.toml", "out.yaml", "out.json"] {
            let path = dir.path().join(name);
            sample.save(&path).unwrap();
            let loaded = Config::from_file(&path).unwrap();
            assert_eq!(loaded, sample, "format of {}", name);
        }
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config
            .endpoints
            .insert("broken".to_string(), EndpointConfig::new("not a url"));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("endpoints.broken.url"));
    }

    #[test]
    fn test_validate_rejects_negative_window() {
        let mut endpoint = EndpointConfig::new("https://api.example.com");
        endpoint.window_secs = -1.0;
        assert!(endpoint.to_endpoint("neg").is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
