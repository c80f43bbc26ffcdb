//! Initialize the data directory for a user.

use anyhow::Result;
use galaxy_sync_client::SyncConfig;
use std::path::{Path, PathBuf};

use crate::config::{self, DATABASE_FILE};

/// Run the init command.
pub async fn run(data_dir: &Path, user: &str, force: bool) -> Result<()> {
    if user.is_empty() {
        anyhow::bail!("User id must not be empty");
    }
    if config::exists(data_dir) && !force {
        anyhow::bail!(
            "Already initialized. Delete {} or pass --force to reinitialize.",
            config::config_path(data_dir).display()
        );
    }

    let mut config = SyncConfig::default();
    config.user_id = Some(user.to_string());
    config.storage.database = PathBuf::from(DATABASE_FILE);
    config::save(data_dir, &config).await?;

    println!("Initialized galaxy-sync!");
    println!();
    println!("  User:     {}", user);
    println!("  Config:   {}", config::config_path(data_dir).display());
    println!("  Cache:    {}", data_dir.join(DATABASE_FILE).display());
    println!();
    println!("Next steps:");
    println!("  1. Fill the cache with sample data: galaxy-sync demo --persist");
    println!("  2. List conversations: galaxy-sync conversations");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_writes_config() {
        let dir = tempdir().unwrap();
        run(dir.path(), "alice", false).await.unwrap();

        let config = config::load(dir.path()).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("alice"));
        assert_eq!(config.paging.message_page_size, 20);
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();
        run(dir.path(), "alice", false).await.unwrap();

        assert!(run(dir.path(), "bob", false).await.is_err());
        run(dir.path(), "bob", true).await.unwrap();
        let config = config::load(dir.path()).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("bob"));
    }
}
