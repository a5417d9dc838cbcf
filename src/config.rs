//! Service configuration.
//!
//! Configuration loading is resilient by design: a missing `config.yaml` or
//! a parse error logs and falls back to [`Config::default()`] rather than
//! aborting startup, the same tradeoff the original backend makes for its
//! own `config.yaml` (availability over configuration perfection).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncLimits,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_port_attempts")]
    pub max_port_attempts: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncLimits {
    #[serde(default = "default_transaction_limit")]
    pub default_transaction_limit: u32,
}

fn default_database_url() -> String {
    "sqlite://mentatsync.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_port_attempts() -> u16 {
    10
}

fn default_transaction_limit() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            backend: BackendConfig::default(),
            sync: SyncLimits::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            bind_addr: default_bind_addr(),
            port: default_port(),
            max_port_attempts: default_max_port_attempts(),
        }
    }
}

impl Default for SyncLimits {
    fn default() -> Self {
        SyncLimits {
            default_transaction_limit: default_transaction_limit(),
        }
    }
}

/// Load configuration from `config.yaml`, searching the current directory
/// and up to three parent directories, falling back to hardcoded defaults
/// if no file is found or it fails to parse.
pub fn load_config() -> Config {
    let exe_path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    let exe_dir = exe_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let mut config_path = exe_dir;
    let mut found = config_path.join("config.yaml").exists();

    if !found {
        for _ in 0..3 {
            config_path = match config_path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => break,
            };
            if config_path.join("config.yaml").exists() {
                found = true;
                break;
            }
        }
    }

    if found {
        let config_file = config_path.join("config.yaml");
        match fs::read_to_string(&config_file) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    debug!("loaded configuration from {:?}", config_file);
                    return config;
                }
                Err(e) => error!("error parsing config.yaml: {}", e),
            },
            Err(e) => error!("error reading config.yaml: {}", e),
        }
    }

    debug!("using default configuration");
    Config::default()
}
