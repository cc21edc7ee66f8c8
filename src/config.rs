//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "synergy-board.yaml";

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address to bind the HTTP server to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".synergy-board/board.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Reasoning gateway settings. The credential is never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Model name passed to the generation endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound on a single gateway call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Read the API key from the configured environment variable.
    /// Blank values count as absent.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an explicit path, else the default file, else defaults;
    /// then apply environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load(DEFAULT_CONFIG_FILE).unwrap_or_default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override file values from `SYNERGY_BOARD_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var("SYNERGY_BOARD_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(port) = std::env::var("SYNERGY_BOARD_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(timeout) = std::env::var("SYNERGY_BOARD_GATEWAY_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                self.gateway.timeout_secs = timeout;
            }
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.gateway.model, "gemini-1.5-flash-latest");
        assert_eq!(config.gateway.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.gateway.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 8088\ngateway:\n  timeout_secs: 5").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.gateway.timeout_secs, 5);
        assert_eq!(config.gateway.model, "gemini-1.5-flash-latest");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load_or_default(Some(Path::new("/nonexistent/board.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn unset_key_env_disables_gateway() {
        let config = GatewayConfig {
            api_key_env: "SYNERGY_BOARD_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.api_key().is_none());
    }

    #[test]
    fn ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.db_path = dir.path().join("nested").join("board.db");
        config.ensure_db_dir().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
