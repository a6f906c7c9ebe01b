//! Configuration module
//!
//! Reads the TOML application configuration
//! (`~/.config/mops/config.toml` by default). Every field has a default, so
//! an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::support::errors::ConfigError;

/// Default port to listen on.
pub const DEFAULT_PORT: u16 = 8888;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mops")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub metal: MetalConfig,
    pub templates: TemplatesConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Timeout for reading an inbound request body, in seconds.
    pub read_timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            read_timeout_secs: 5,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Metal backend connection
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalConfig {
    /// Base URL of the metal server API
    pub url: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed certificates
    pub insecure_tls: bool,
    /// Log a hex dump of every request and response
    pub debug: bool,
}

impl Default for MetalConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:9443".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            insecure_tls: true,
            debug: false,
        }
    }
}

impl std::fmt::Debug for MetalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure_tls", &self.insecure_tls)
            .field("debug", &self.debug)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding the `*.tmpl` report templates
    pub dir: PathBuf,
    /// Fail on references to missing fields
    pub strict: bool,
    /// Maximum nesting of `include`; unbounded when unset
    pub max_include_depth: Option<usize>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports"),
            strict: false,
            max_include_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `mops=debug,info`
    pub level: String,
    /// JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
