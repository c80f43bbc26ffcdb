//! # sync-core
//!
//! Pure logic for galaxy-sync (no I/O, instant tests).
//!
//! This crate implements the state machines and policies of the sync core
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (remote feed, local store, timers) is performed by
//! `sync-client`, which drives these types from its tasks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod buffer;
pub mod cursor;
pub mod load;
pub mod paging;
pub mod scope;

pub use backoff::RetryBackoff;
pub use buffer::SampleBuffer;
pub use cursor::{AppendCursor, Boundary};
pub use load::{LoadOutcome, LoadType};
pub use paging::{
    PagingConfig, BATCH_INTERVAL, CONVERSATION_PAGE_SIZE, MESSAGE_PAGE_SIZE, REMOTE_PAGE_SIZE,
    TAIL_LIMIT,
};
pub use scope::{ScopeState, Transition};
