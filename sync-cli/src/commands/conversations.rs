//! List cached conversations.

use anyhow::Result;
use galaxy_sync_types::UserId;
use std::path::Path;

use super::{collect, open_cache, print_conversation};
use crate::config;

/// Run the conversations command.
pub async fn run(data_dir: &Path, limit: usize) -> Result<()> {
    let sync = open_cache(data_dir).await?;
    let me = UserId::from(config::signed_in_user(sync.config())?);
    let (conversations, more) = collect(&sync.conversations_pager(), limit).await?;

    if conversations.is_empty() {
        println!("No cached conversations.");
        return Ok(());
    }

    println!("Conversations ({}):", conversations.len());
    for conversation in &conversations {
        print_conversation(conversation, &me);
    }
    if more {
        println!("  ... more available (raise --limit)");
    }
    Ok(())
}
