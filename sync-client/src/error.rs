//! Error types for sync-client.

use std::path::PathBuf;

use galaxy_sync_types::SyncError;

use crate::config::ConfigError;

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be turned back into a model value.
    #[error("corrupt {table} row {id}: {reason}")]
    Corrupt {
        /// Table the row lives in.
        table: &'static str,
        /// Primary key of the row.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Remote feed errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    /// The feed could not be reached. Retrying later may succeed.
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    /// The feed refused the request. Retrying will not help.
    #[error("feed rejected request: {0}")]
    Rejected(String),

    /// The feed returned a document of the wrong shape.
    #[error(transparent)]
    Malformed(#[from] SyncError),
}

impl FeedError {
    /// Whether a later retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Unavailable(_))
    }
}

impl From<FeedError> for SyncError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Unavailable(reason) => SyncError::TransientNetwork(reason),
            FeedError::Rejected(reason) => SyncError::PermanentWrite(reason),
            FeedError::Malformed(err) => err,
        }
    }
}

/// Page-fill and pagination errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The remote fetch failed; the load can be retried.
    #[error("remote fetch failed: {0}")]
    Retryable(#[from] FeedError),

    /// The local store failed.
    #[error("local store failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the [`ChatSync`](crate::ChatSync) facade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote feed error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Domain error (bad ids, illegal status change).
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
