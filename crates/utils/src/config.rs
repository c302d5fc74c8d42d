use std::{fs, path::Path};

use serde::Deserialize;

use crate::{KeySchema, DEFAULT_WILDCARD_MARKER};

/// Top-level configuration for the Mailfwd forwarder.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub forwarder: ForwarderConfig,
}

/// Forwarder configuration.
#[derive(Debug, Deserialize)]
pub struct ForwarderConfig {
    /// Name of the table (or key namespace) holding the mapping entries.
    pub mapping_table_name: String,

    /// Prefix prepended to a message identifier to locate the raw message.
    pub message_store_location_prefix: String,

    #[serde(default)]
    pub key_schema: KeySchema,

    #[serde(default = "default_wildcard_marker")]
    pub wildcard_marker: String,

    #[serde(default)]
    pub mapping: MappingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Configuration of the mapping store backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MappingConfig {
    /// Entries listed in the configuration itself.
    #[serde(rename = "memory")]
    Memory {
        #[serde(default)]
        entries: Vec<MappingEntryConfig>,
    },

    /// SQLite database file.
    #[serde(rename = "sqlite")]
    Sqlite {
        #[serde(default = "default_mapping_path")]
        path: String,
    },

    /// Redis sets.
    #[serde(rename = "redis")]
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
    },
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_mapping_path(),
        }
    }
}

/// A statically configured mapping entry, `local_part` may be the wildcard
/// marker.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingEntryConfig {
    pub local_part: String,
    pub domain: String,
    pub destinations: Vec<String>,
}

/// Configuration of the raw message store backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Messages read from the filesystem.
    #[serde(rename = "file")]
    File {
        #[serde(default = "default_mailstore_path")]
        path: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::File {
            path: default_mailstore_path(),
        }
    }
}

/// Configuration of the mail submission backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DispatchConfig {
    /// SMTP relay submission.
    #[serde(rename = "smtp")]
    Smtp {
        #[serde(default = "default_smtp_host")]
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        #[serde(default)]
        tls: bool,
        username: Option<String>,
        password: Option<String>,
    },

    /// Outbox directory spooling.
    #[serde(rename = "file")]
    File {
        #[serde(default = "default_outbox_path")]
        path: String,
    },
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::Smtp {
            host: default_smtp_host(),
            port: default_smtp_port(),
            tls: false,
            username: None,
            password: None,
        }
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred reading the file.
    Io(std::io::Error),
    /// A parse error occurred deserializing TOML.
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_wildcard_marker() -> String {
    DEFAULT_WILDCARD_MARKER.to_string()
}

fn default_mapping_path() -> String {
    "mapping.db".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_mailstore_path() -> String {
    "mailstore".to_string()
}

fn default_smtp_host() -> String {
    "127.0.0.1".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_outbox_path() -> String {
    "outbox".to_string()
}
