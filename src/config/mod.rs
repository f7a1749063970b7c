// Configuration module
// Loads layered configuration: file source, environment overrides, defaults

use serde::Deserialize;
use std::net::SocketAddr;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Connection pool configuration.
///
/// `database` is required at load time. `user` and `password` default to empty
/// strings; whether they are required is decided by the driver
/// (`Driver::check_config`) when the pool is opened.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    pub charset: String,
    pub autocommit: bool,
    pub min_size: usize,
    pub max_size: usize,
}

/// Logging configuration; absent file paths mean stdout/stderr.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub access_log_file: Option<String>,
    #[serde(default)]
    pub error_log_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the specified file path (without extension),
    /// overlaid with `LOAM_*` environment variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("LOAM").separator("__"))
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8082)?
            .set_default("db.host", "localhost")?
            .set_default("db.port", 3306)?
            .set_default("db.charset", "utf8")?
            .set_default("db.autocommit", true)?
            .set_default("db.min_size", 1)?
            .set_default("db.max_size", 16)?
            .set_default("logging.level", "info")?
            .build()?;

        settings.try_deserialize()
    }

    /// Default config file is "config.toml" in the working directory.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.web.host, self.web.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            charset: "utf8".to_string(),
            autocommit: true,
            min_size: 1,
            max_size: 16,
        }
    }
}

impl DbConfig {
    /// In-memory SQLite pool configuration, mostly for tests and demos.
    pub fn sqlite_in_memory() -> Self {
        Self {
            database: ":memory:".to_string(),
            max_size: 1,
            ..Self::default()
        }
    }
}
