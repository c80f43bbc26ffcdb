//! Paging constants and configuration.

use std::time::Duration;

/// Messages per local page.
pub const MESSAGE_PAGE_SIZE: usize = 20;
/// Conversations per local page.
pub const CONVERSATION_PAGE_SIZE: usize = 30;
/// Messages per remote page-fill.
pub const REMOTE_PAGE_SIZE: usize = 50;
/// Newest messages covered by a room's tail subscription.
pub const TAIL_LIMIT: usize = 3;
/// Tick of the conversation-list drain.
pub const BATCH_INTERVAL: Duration = Duration::from_millis(700);

/// Sizes used by pagers and the mediator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    /// Rows per local page.
    pub page_size: usize,
    /// Rows per remote fetch.
    pub remote_page_size: usize,
    /// Whether missing rows are rendered as placeholders. Always `false` here.
    pub enable_placeholders: bool,
}

impl PagingConfig {
    /// Paging for a conversation's messages.
    pub fn messages() -> Self {
        Self {
            page_size: MESSAGE_PAGE_SIZE,
            remote_page_size: REMOTE_PAGE_SIZE,
            enable_placeholders: false,
        }
    }

    /// Paging for the conversation list.
    pub fn conversations() -> Self {
        Self {
            page_size: CONVERSATION_PAGE_SIZE,
            remote_page_size: REMOTE_PAGE_SIZE,
            enable_placeholders: false,
        }
    }

    /// Same config with another local page size. Zero is raised to one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
