//! Command-line interface for poster-bot
//!
//! ```text
//! poster-bot [--verbose] [--config PATH] run [--events PATH|-] [--dry-run] [--panel]
//! poster-bot [--verbose] [--config PATH] check
//! ```

pub mod handlers;
mod output;

pub use output::OutputFormatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "poster-bot")]
#[command(author, version, about = "Announcement and support-ticket helper for chat guilds", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./poster-bot.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and process gateway events
    Run {
        /// Event feed, one JSON object per line; `-` reads stdin
        #[arg(short, long, value_name = "PATH", default_value = "-")]
        events: String,

        /// Use the in-memory simulator instead of the platform API
        #[arg(long)]
        dry_run: bool,

        /// Open the interactive control panel
        #[arg(long)]
        panel: bool,
    },

    /// Validate the configuration and print it
    Check,
}
