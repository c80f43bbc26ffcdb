//! # galaxy-sync
//!
//! CLI tool for inspecting and exercising the galaxy-sync cache.
//!
//! ## Commands
//!
//! - `init`: Write the configuration for a user
//! - `conversation-id`: Derive the id of a direct conversation
//! - `conversations`: List cached conversations
//! - `messages`: List cached messages of a conversation
//! - `sign-out`: Clear the local cache
//! - `demo`: Run the sync core against an in-memory feed
//!
//! ## Example
//!
//! ```bash
//! # Initialize for a user
//! galaxy-sync init --user alice
//!
//! # Fill the cache with sample data
//! galaxy-sync demo --persist
//!
//! # Look at it
//! galaxy-sync conversations
//! galaxy-sync messages alice_bob --limit 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{conversation_id, conversations, demo, init, messages, sign_out};

/// CLI tool for inspecting and exercising the galaxy-sync cache.
#[derive(Parser, Debug)]
#[command(name = "galaxy-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the configuration and the cache
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the configuration for a user
    Init {
        /// Signed-in user id
        #[arg(long, short)]
        user: String,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print the id of the direct conversation between two users
    ConversationId {
        /// First user id
        a: String,
        /// Second user id
        b: String,
    },

    /// List cached conversations, most recent first
    Conversations {
        /// Maximum number of conversations to show
        #[arg(long, default_value = "30")]
        limit: usize,
    },

    /// List cached messages of a conversation, newest first
    Messages {
        /// Conversation id
        conversation: String,

        /// Maximum number of messages to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Clear the local cache
    SignOut,

    /// Run the sync core against an in-memory feed
    Demo {
        /// Keep the results in the configured cache instead of memory
        #[arg(long)]
        persist: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Init { user, force } => {
            init::run(&data_dir, &user, force).await?;
        }
        Commands::ConversationId { a, b } => {
            conversation_id::run(&a, &b)?;
        }
        Commands::Conversations { limit } => {
            conversations::run(&data_dir, limit).await?;
        }
        Commands::Messages {
            conversation,
            limit,
        } => {
            messages::run(&data_dir, &conversation, limit).await?;
        }
        Commands::SignOut => {
            sign_out::run(&data_dir).await?;
        }
        Commands::Demo { persist } => {
            demo::run(&data_dir, persist).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for galaxy-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("chat", "galaxy", "galaxy-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
