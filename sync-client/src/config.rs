//! Configuration loading for sync-client.
//!
//! Configuration is loaded from a TOML file (the CLI uses
//! `galaxy-sync.toml`). Every field has a default, so an empty file or a
//! file with only some sections is valid.

use galaxy_sync_core::{
    PagingConfig, CONVERSATION_PAGE_SIZE, MESSAGE_PAGE_SIZE, REMOTE_PAGE_SIZE, TAIL_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for sync-client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Signed-in user, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Local cache configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Paging configuration.
    #[serde(default)]
    pub paging: PagingSection,
    /// Live sync configuration.
    #[serde(default)]
    pub live: LiveConfig,
}

/// Local cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file (default: galaxy-sync.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Paging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingSection {
    /// Messages per local page (default: 20).
    #[serde(default = "default_message_page_size")]
    pub message_page_size: usize,
    /// Conversations per local page (default: 30).
    #[serde(default = "default_conversation_page_size")]
    pub conversation_page_size: usize,
    /// Messages per remote page-fill (default: 50).
    #[serde(default = "default_remote_page_size")]
    pub remote_page_size: usize,
}

/// Live sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Newest messages covered by a room's tail subscription (default: 3).
    #[serde(default = "default_tail_limit")]
    pub tail_limit: usize,
    /// Conversation-list drain tick in milliseconds (default: 700).
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("galaxy-sync.db")
}

fn default_message_page_size() -> usize {
    MESSAGE_PAGE_SIZE
}

fn default_conversation_page_size() -> usize {
    CONVERSATION_PAGE_SIZE
}

fn default_remote_page_size() -> usize {
    REMOTE_PAGE_SIZE
}

fn default_tail_limit() -> usize {
    TAIL_LIMIT
}

fn default_batch_interval_ms() -> u64 {
    700
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for PagingSection {
    fn default() -> Self {
        Self {
            message_page_size: default_message_page_size(),
            conversation_page_size: default_conversation_page_size(),
            remote_page_size: default_remote_page_size(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tail_limit: default_tail_limit(),
            batch_interval_ms: default_batch_interval_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            storage: StorageConfig::default(),
            paging: PagingSection::default(),
            live: LiveConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Paging for message lists.
    pub fn message_paging(&self) -> PagingConfig {
        let mut paging = PagingConfig::messages().with_page_size(self.paging.message_page_size);
        paging.remote_page_size = self.paging.remote_page_size.max(1);
        paging
    }

    /// Paging for the conversation list.
    pub fn conversation_paging(&self) -> PagingConfig {
        PagingConfig::conversations().with_page_size(self.paging.conversation_page_size)
    }

    /// Render as TOML, as written by `galaxy-sync init`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Drain tick of the conversation list.
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.live.batch_interval_ms.max(1))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
