//! Configuration management for galaxy-sync.

use anyhow::{Context, Result};
use galaxy_sync_client::SyncConfig;
use std::path::{Path, PathBuf};

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE: &str = "galaxy-sync.toml";

/// File name of the default cache database inside the data directory.
pub const DATABASE_FILE: &str = "galaxy-sync.db";

/// Path of the configuration file in `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Check if the data directory is initialized.
pub fn exists(data_dir: &Path) -> bool {
    config_path(data_dir).exists()
}

/// Load the configuration from `data_dir`.
///
/// A relative database path is taken relative to `data_dir`.
pub fn load(data_dir: &Path) -> Result<SyncConfig> {
    let path = config_path(data_dir);
    if !path.exists() {
        anyhow::bail!("Not initialized. Run 'galaxy-sync init --user <id>' first.");
    }

    let mut config = SyncConfig::from_file(&path)?;
    if config.storage.database.is_relative() {
        config.storage.database = data_dir.join(&config.storage.database);
    }
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Save `config` to `data_dir`.
pub async fn save(data_dir: &Path, config: &SyncConfig) -> Result<()> {
    let contents = config.to_toml().context("Failed to render configuration")?;
    tokio::fs::write(config_path(data_dir), contents)
        .await
        .context("Failed to save configuration")?;
    Ok(())
}

/// The signed-in user recorded by `init`.
pub fn signed_in_user(config: &SyncConfig) -> Result<&str> {
    config
        .user_id
        .as_deref()
        .context("No user configured. Run 'galaxy-sync init --user <id>'.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Not initialized"));
    }

    #[tokio::test]
    async fn relative_database_is_resolved_against_data_dir() {
        let dir = tempdir().unwrap();
        let mut config = SyncConfig::default();
        config.user_id = Some("alice".into());
        config.storage.database = PathBuf::from(DATABASE_FILE);
        save(dir.path(), &config).await.unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.storage.database, dir.path().join(DATABASE_FILE));
        assert_eq!(signed_in_user(&loaded).unwrap(), "alice");
    }
}
