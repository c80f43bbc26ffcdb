//! List cached messages of a conversation.

use anyhow::Result;
use std::path::Path;

use super::{collect, open_cache, print_message};

/// Run the messages command.
pub async fn run(data_dir: &Path, conversation: &str, limit: usize) -> Result<()> {
    let sync = open_cache(data_dir).await?;
    let (messages, more) = collect(&sync.messages_pager(conversation.into()), limit).await?;

    if messages.is_empty() {
        println!("No cached messages in {}.", conversation);
        return Ok(());
    }

    println!("Messages in {} (newest first):", conversation);
    for message in &messages {
        print_message(message);
    }
    if more {
        println!("  ... more available (raise --limit)");
    }
    Ok(())
}
