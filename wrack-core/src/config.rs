//! Platform configuration loaded once at startup
//!
//! The configuration is read-only after load. It lives at
//! `~/.config/wrack/config.toml` by default; the `WRACK_CONFIG_FP`
//! environment variable overrides the location.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, WrackError};

/// Environment variable pointing at an alternate config file
pub const CONFIG_ENV_VAR: &str = "WRACK_CONFIG_FP";

/// Default config file path: `~/.config/wrack/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wrack")
        .join("config.toml")
}

fn default_pg_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webserver_port() -> u16 {
    21174
}

/// General platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    /// Whether this deployment is a test environment.
    ///
    /// Test environments relax the requirements on `base_data_dir` and the
    /// Postgres password so a developer checkout works out of the box.
    #[serde(default)]
    pub test_environment: bool,

    /// Root directory holding the filepath mountpoints.
    ///
    /// Required outside test environments; test environments fall back to
    /// a `test_data` directory relative to the working directory.
    pub base_data_dir: Option<PathBuf>,

    /// Scratch directory for staging and intermediate files
    pub working_dir: PathBuf,
}

/// Postgres connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database role to connect as
    pub user: String,
    /// Role password; may be omitted in test environments
    pub password: Option<String>,
    /// Database name
    pub database: String,
    /// Server hostname
    #[serde(default = "default_pg_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_pg_port")]
    pub port: u16,
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server hostname
    #[serde(default = "default_redis_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Logical database index
    #[serde(default)]
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
        }
    }
}

/// Webserver bind settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebserverConfig {
    /// Interface to bind
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on
    #[serde(default = "default_webserver_port")]
    pub port: u16,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_webserver_port(),
        }
    }
}

impl WebserverConfig {
    /// Socket address string for binding, e.g. `127.0.0.1:21174`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// EBI submission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbiConfig {
    /// Dropbox endpoint sequence data is sent to
    pub dropbox_url: String,
    /// Center name reported in submission metadata
    pub center_name: String,
}

/// Static configuration for the wrack platform.
///
/// Loaded once at startup and immutable during runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General platform settings
    pub main: MainConfig,

    /// Postgres connection settings
    pub postgres: PostgresConfig,

    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisConfig,

    /// Webserver bind settings
    #[serde(default)]
    pub webserver: WebserverConfig,

    /// EBI submission settings
    pub ebi: EbiConfig,
}

impl Config {
    /// Parse a Config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the Config to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WrackError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load the config from `WRACK_CONFIG_FP`, falling back to the
    /// default location.
    pub fn from_env() -> Result<Self> {
        let path = env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        Self::load(&path)
    }

    /// Root directory holding the filepath mountpoints.
    ///
    /// Test environments without an explicit `base_data_dir` use
    /// `test_data` under the working directory.
    pub fn base_data_dir(&self) -> PathBuf {
        match &self.main.base_data_dir {
            Some(dir) => dir.clone(),
            None => self.main.working_dir.join("test_data"),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.main.test_environment {
            if self.main.base_data_dir.is_none() {
                return Err(WrackError::Config(
                    "main.base_data_dir is required outside test environments".to_string(),
                ));
            }
            if self.postgres.password.is_none() {
                return Err(WrackError::Config(
                    "postgres.password is required outside test environments".to_string(),
                ));
            }
        }
        Ok(())
    }
}
