//! poster-bot - Announcement and support-ticket helper for chat guilds
//!
//! This is the main entry point for the poster-bot binary. It loads the
//! environment and configuration, sets up logging and dispatches to the
//! command handlers.

use clap::Parser;
use poster_bot::cli::handlers::{RunOptions, handle_check_command, handle_run_command};
use poster_bot::cli::{Cli, Commands, OutputFormatter};
use poster_bot::config::BotConfig;
use poster_bot::error::{BotError, Result};
use std::process;
use tracing_subscriber::EnvFilter;

/// Main entry point for the poster-bot CLI
///
/// Any error reaching this point is fatal: it is reported and the process
/// exits with status 1.
fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let formatter = OutputFormatter::new(cli.json, cli.no_color);

    if let Err(e) = run(cli, &formatter) {
        handle_error(&e, &formatter);
        process::exit(1);
    }
}

fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    init_tracing(cli.verbose);

    let config = BotConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => handle_check_command(&config, formatter),
        Commands::Run {
            events,
            dry_run,
            panel,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(handle_run_command(
                RunOptions {
                    events,
                    dry_run,
                    panel,
                },
                &config,
                formatter,
            ));
            // The control panel thread may still be waiting on the terminal
            runtime.shutdown_background();
            result
        },
    }
}

/// Log to stderr; `RUST_LOG` applies unless `--verbose` forces debug
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_error(error: &BotError, formatter: &OutputFormatter) {
    formatter.error(&error.user_message());

    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        eprintln!("\nSuggestions:");
        for suggestion in &suggestions {
            eprintln!("  • {suggestion}");
        }
    }

    if formatter.is_json() {
        let _ = formatter.json(&serde_json::json!({
            "status": "error",
            "error": error.to_string(),
            "suggestions": suggestions,
            "fatal": error.is_fatal(),
        }));
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        eprintln!("\nDebug information:");
        eprintln!("{error:?}");
    }
}
