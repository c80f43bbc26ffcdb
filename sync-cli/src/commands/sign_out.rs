//! Clear the local cache.

use anyhow::Result;
use std::path::Path;

use super::open_cache;

/// Run the sign-out command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let sync = open_cache(data_dir).await?;
    sync.sign_out().await?;
    println!("Signed out. Local cache cleared.");
    Ok(())
}
