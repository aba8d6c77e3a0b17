//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/imara/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/imara/` (~/.config/imara/)
//! - State/Logs: `$XDG_STATE_HOME/imara/` (~/.local/state/imara/)
//!
//! `IMARA_WS_URL` and `IMARA_API_URL` override the server URLs from the file.

use crate::error::{Error, Result};
use crate::export::ExportFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Backend endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Backend endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Streaming research endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Base URL for the REST endpoints (`/`, `/health`, `/api/research`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// HTTP request timeout in seconds (REST only; the stream has no timeout)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws/research".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl ServerConfig {
    /// Check the streaming endpoint used by research sessions
    pub fn validate_ws_url(&self) -> Result<()> {
        if !has_scheme(&self.ws_url, &["ws://", "wss://"]) {
            return Err(Error::Config(format!(
                "server.ws_url must start with ws:// or wss://, got {:?}",
                self.ws_url
            )));
        }
        Ok(())
    }

    /// Check the REST base URL and request timeout
    pub fn validate_api(&self) -> Result<()> {
        if !has_scheme(&self.api_url, &["http://", "https://"]) {
            return Err(Error::Config(format!(
                "server.api_url must start with http:// or https://, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "server.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Every problem with these settings, for display
    pub fn problems(&self) -> Vec<String> {
        [self.validate_ws_url(), self.validate_api()]
            .into_iter()
            .filter_map(|check| check.err().map(|e| e.to_string()))
            .collect()
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let lower = url.to_ascii_lowercase();
    schemes
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Report export settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExportConfig {
    /// Directory reports are saved to (defaults to the working directory)
    pub directory: Option<PathBuf>,

    /// Artifact format
    #[serde(default)]
    pub format: ExportFormat,
}

impl Config {
    /// Load configuration from the default path
    ///
    /// Endpoint URLs are not validated here; each command checks the ones
    /// it uses, so a bad value can still be inspected with `imara config`.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply `IMARA_WS_URL` / `IMARA_API_URL` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("IMARA_WS_URL") {
            if !url.is_empty() {
                self.server.ws_url = url;
            }
        }
        if let Ok(url) = std::env::var("IMARA_API_URL") {
            if !url.is_empty() {
                self.server.api_url = url;
            }
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/imara/config.toml` (~/.config/imara/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("imara").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/imara/` (~/.local/state/imara/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("imara")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/imara/imara.log` (~/.local/state/imara/imara.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("imara.log")
    }

    /// Directory exported reports are written to
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.ws_url, "ws://localhost:8000/ws/research");
        assert_eq!(config.server.api_url, "http://localhost:8000");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.export.format, ExportFormat::Json);
        assert_eq!(config.export_dir(), PathBuf::from("."));
        assert!(config.server.problems().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
ws_url = "wss://imara.example.com/ws/research"
api_url = "https://imara.example.com"

[logging]
level = "debug"

[export]
directory = "/tmp/reports"
format = "text"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.ws_url, "wss://imara.example.com/ws/research");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.export.format, ExportFormat::Text);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/reports"));
        assert!(config.server.problems().is_empty());
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            ws_url: "http://localhost:8000/ws/research".to_string(),
            ..Default::default()
        };
        assert!(config.validate_ws_url().is_err());
        assert!(config.validate_api().is_ok());

        let config = ServerConfig {
            api_url: "localhost:8000".to_string(),
            ..Default::default()
        };
        assert!(config.validate_api().is_err());
        assert!(config.validate_ws_url().is_ok());

        let config = ServerConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate_api().is_err());

        let config = ServerConfig {
            ws_url: "ws://".to_string(),
            ..Default::default()
        };
        assert!(config.validate_ws_url().is_err());
    }

    #[test]
    fn test_problems_lists_each_bad_endpoint() {
        let config = ServerConfig {
            ws_url: "http://localhost:8000/ws/research".to_string(),
            api_url: "ftp://localhost".to_string(),
            ..Default::default()
        };
        let problems = config.problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("server.ws_url"));
        assert!(problems[1].contains("server.api_url"));
    }

    #[test]
    fn test_load_from_keeps_invalid_urls() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nws_url = \"not a url\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.ws_url, "not a url");
        assert!(config.server.validate_ws_url().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server.ws_url, "ws://localhost:8000/ws/research");
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nws_url = 1").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
