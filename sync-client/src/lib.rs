//! # sync-client
//!
//! Offline-first sync core for Galaxy Chat.
//!
//! The UI renders exclusively from the local cache; this crate keeps that
//! cache consistent with the remote feed.
//!
//! ## Components
//!
//! - **Local store** ([`store`]): SQLite cache of messages and conversations
//! - **Remote feed** ([`remote`]): fetch/subscribe contract plus the
//!   in-memory [`MemoryFeed`]
//! - **Page-fill mediator** ([`mediator`]): pulls older remote pages into
//!   the cache when paging runs dry
//! - **Pagination controller** ([`pager`]): ordered, restartable views with
//!   load state and retry
//! - **Live sync coordinator** ([`live`]): room and conversation-list
//!   subscriptions with a batched drain
//! - **Send pipeline** ([`send`]): optimistic write, remote write,
//!   failed-status compensation
//!
//! ## Example
//!
//! ```ignore
//! use galaxy_sync_client::{ChatSync, MemoryFeed, SyncConfig};
//!
//! let sync = ChatSync::open(SyncConfig::default(), Arc::new(MemoryFeed::new())).await?;
//! sync.attach_room("alice_bob".into()).await?;
//!
//! let pager = sync.messages_pager("alice_bob".into());
//! pager.refresh().await?;
//! pager.load_more().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod drain;
pub mod error;
pub mod live;
pub mod mediator;
pub mod pager;
pub mod remote;
pub mod send;
pub mod store;

pub use client::ChatSync;
pub use config::{ConfigError, SyncConfig};
pub use drain::spawn_sampled_drain;
pub use error::{ClientError, FeedError, LoadError, StoreError};
pub use live::LiveSyncCoordinator;
pub use mediator::PageFillMediator;
pub use pager::{
    ConversationSource, LoadState, MessageSource, PageSnapshot, PageSource, Pager, RemoteFill,
};
pub use remote::{
    EventKind, FeedEvent, FeedQuery, ListenerId, MemoryFeed, RemoteFeed, Subscription,
};
pub use send::{SendOutcome, SendPipeline, SendReceipt};
pub use store::{LocalStore, SqliteStore, StoreChange, StoreMetrics};
