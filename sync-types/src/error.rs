//! Error types for galaxy-sync.

use thiserror::Error;

use crate::MessageStatus;

/// Errors that can occur in galaxy-sync operations.
///
/// The first three variants form the taxonomy every layer maps onto:
/// transient failures are retried by the pager, permanent write failures
/// become failed-status rows, and malformed snapshots are dropped.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The remote feed could not be reached; retry later.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The remote feed rejected a write.
    #[error("permanent write error: {0}")]
    PermanentWrite(String),

    /// A remote item did not parse into the expected shape.
    #[error("malformed snapshot at {path}: {reason}")]
    MalformedSnapshot {
        /// Remote path the snapshot was read from.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A two-party conversation was requested with the same user twice.
    #[error("a conversation needs two distinct participants, got {0} twice")]
    SameParticipant(String),

    /// A user id cannot be used to derive a conversation id.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// A document could not be encoded for the feed.
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    /// A status change that would move a message backwards.
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        /// Current status.
        from: MessageStatus,
        /// Requested status.
        to: MessageStatus,
    },
}

impl SyncError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TransientNetwork(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::MalformedSnapshot {
            path: "messages-list/a_b/messages/m1".into(),
            reason: "missing field `body`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed snapshot at messages-list/a_b/messages/m1: missing field `body`"
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(SyncError::TransientNetwork("offline".into()).is_retryable());
        assert!(!SyncError::PermanentWrite("denied".into()).is_retryable());
        assert!(!SyncError::SameParticipant("a".into()).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
