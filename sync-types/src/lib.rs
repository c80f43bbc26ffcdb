//! # sync-types
//!
//! Data model and wire vocabulary for galaxy-sync.
//!
//! This crate provides the foundational types used across all galaxy-sync crates:
//! - [`MessageId`], [`ConversationId`], [`UserId`] - Identity types
//! - [`Message`], [`Conversation`], [`ConversationMetadata`] - The cached data model
//! - [`wire`] - The flat snake_case vocabulary spoken by the remote feed
//! - [`paths`] - Logical remote feed paths
//! - [`SyncError`] - Error taxonomy shared by every layer

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod model;
pub mod paths;
pub mod wire;

pub use error::SyncError;
pub use ids::{ConversationId, MessageId, UserId};
pub use model::{
    Conversation, ConversationMetadata, LastMessage, Message, MessageKind, MessageStatus,
    ModificationType, QuotedMessage, UserProfile,
};
