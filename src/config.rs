//! Configuration module for fingerd.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the finger server
#[derive(Parser, Debug)]
#[command(name = "fingerd")]
#[command(author = "fingerd authors")]
#[command(version = "0.1.0")]
#[command(about = "A finger (RFC 1288) information server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface address to listen on (default: all interfaces)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Host name announced in the listing banner
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// Seconds to wait for the query line (0 = wait forever)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Interface address to bind to
    pub interface: Option<String>,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host name override for the banner
    pub hostname: Option<String>,
    /// Query read timeout in seconds (0 = none)
    #[serde(default)]
    pub read_timeout: u64,
    /// Longest accepted query line, excluding the terminator
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: None,
            port: default_port(),
            hostname: None,
            read_timeout: 0,
            max_line_length: default_max_line_length(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    79
}

fn default_max_line_length() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub interface: Option<String>,
    pub port: u16,
    pub hostname: Option<String>,
    pub read_timeout: Option<Duration>,
    pub max_line_length: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let read_timeout = cli.read_timeout.unwrap_or(toml_config.server.read_timeout);

        Config {
            interface: cli
                .interface
                .or(toml_config.server.interface)
                .filter(|i| !i.is_empty()),
            port: cli.port.unwrap_or(toml_config.server.port),
            hostname: cli
                .hostname
                .or(toml_config.server.hostname)
                .filter(|h| !h.is_empty()),
            read_timeout: (read_timeout > 0).then(|| Duration::from_secs(read_timeout)),
            max_line_length: toml_config.server.max_line_length,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Address to bind, e.g. `0.0.0.0:79` or `[::1]:79`
    pub fn listen_addr(&self) -> String {
        match self.interface.as_deref() {
            None => format!("0.0.0.0:{}", self.port),
            Some(interface) => match interface.parse::<IpAddr>() {
                Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
                Err(_) => format!("{}:{}", interface, self.port),
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        interface: Some("127.0.0.1".to_string()),
        port: 0,
        hostname: Some("example.box".to_string()),
        read_timeout: None,
        max_line_length: default_max_line_length(),
        log_level: "info".to_string(),
    }
}
