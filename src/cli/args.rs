//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for ezra
#[derive(Parser, Debug)]
#[command(
    name = "ezra",
    version,
    about = "Persistent-memory conversational agent with a tool-using model loop"
)]
pub struct Cli {
    /// Configuration file path (defaults to ./ezra.toml, then ~/.ezra/ezra.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Agent id; defaults to the configured agent
    #[arg(long, global = true)]
    pub agent: Option<String>,

    /// User id the terminal speaks as
    #[arg(long, global = true, default_value = "local-user")]
    pub user: String,

    /// Channel id messages are logged under
    #[arg(long, global = true, default_value = "terminal")]
    pub channel: String,

    /// SQLite database path, overrides the configured store
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace) when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive conversation over stdin
    Chat,

    /// Run a single turn and print the reply
    Ask {
        /// The message to send
        message: Vec<String>,
    },

    /// Create or update the agent and its identity
    InitAgent {
        /// Display name; defaults to the agent id
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        personality: Option<String>,

        /// Per-agent model override
        #[arg(long, default_value = "")]
        model: String,

        /// Extra system instructions
        #[arg(long, default_value = "")]
        instructions: String,
    },

    /// Set a user's reply language (code or name, e.g. "fr" or "French")
    SetLanguage { user: String, language: String },

    /// Merge duplicate facts stored about a user
    CleanupMemories { user: String },

    /// Show context statistics for the agent
    Stats,
}
