//! Derive a direct conversation id.

use anyhow::Result;
use galaxy_sync_client::ChatSync;

/// Run the conversation-id command.
pub fn run(a: &str, b: &str) -> Result<()> {
    let id = ChatSync::conversation_id(&a.into(), &b.into())?;
    println!("{}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_same_user() {
        assert!(run("alice", "alice").is_err());
        assert!(run("alice", "bob").is_ok());
    }
}
