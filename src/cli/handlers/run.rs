//! Handler for the `run` command
//!
//! Builds the platform (live REST client or offline simulator), assembles the
//! [`Bot`], and feeds it events until the feed ends or Ctrl-C is pressed.

use crate::bot::Bot;
use crate::cli::OutputFormatter;
use crate::config::BotConfig;
use crate::core::User;
use crate::error::{BotError, Result};
use crate::gateway::read_events;
use crate::panel::TerminalPanel;
use crate::platform::{ChatPlatform, DiscordRest, InMemoryPlatform};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const EVENT_BUFFER: usize = 64;

/// Options of the `run` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Path of the event feed, `-` for stdin
    pub events: String,
    pub dry_run: bool,
    pub panel: bool,
}

impl RunOptions {
    fn reads_stdin(&self) -> bool {
        self.events == "-"
    }
}

/// Handler for the `run` command
///
/// # Errors
///
/// Returns [`BotError::ConfigurationMissing`] when no token is configured for
/// a live run, or an error if the event feed cannot be opened.
pub async fn handle_run_command(
    options: RunOptions,
    config: &BotConfig,
    output: &OutputFormatter,
) -> Result<()> {
    config.validate()?;
    if options.panel && options.reads_stdin() {
        return Err(BotError::Config(config::ConfigError::Message(
            "--panel needs the terminal; pass the event feed with --events PATH".to_string(),
        )));
    }

    let (platform, simulator) = build_platform(&options, config).await?;
    let bot = Bot::new(platform, config);

    if options.panel {
        let panel = TerminalPanel::new(bot.panel());
        tokio::task::spawn_blocking(move || {
            if let Err(e) = panel.run() {
                warn!("Control panel closed: {}", e);
            }
        });
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if options.reads_stdin() {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&options.events).await?;
        Box::new(BufReader::new(file))
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let feed = tokio::spawn(async move { read_events(reader, tx, simulator.as_deref()).await });

    let interrupted = tokio::select! {
        () = bot.run(rx) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        feed.abort();
        output.warning("Interrupted; pending ticket deletions were abandoned");
        return Ok(());
    }

    match feed.await {
        Ok(Ok(count)) => output.success(&format!("Processed {count} event(s)")),
        Ok(Err(e)) => return Err(e),
        Err(e) => warn!("Event feed task failed: {}", e),
    }
    Ok(())
}

async fn build_platform(
    options: &RunOptions,
    config: &BotConfig,
) -> Result<(Arc<dyn ChatPlatform>, Option<Arc<InMemoryPlatform>>)> {
    if options.dry_run {
        info!("Dry run: using the in-memory simulator");
        let bot = User {
            bot: true,
            ..User::new(0, "poster-bot")
        };
        let simulator = Arc::new(InMemoryPlatform::permissive(bot));
        let shared: Arc<dyn ChatPlatform> = simulator.clone();
        return Ok((shared, Some(simulator)));
    }

    let token = config.token()?;
    let platform = DiscordRest::new(config.bot.api_base.as_str(), token);
    let me = platform.current_user().await?;
    info!("Logged in as {} ({})", me.name, me.id);
    Ok((Arc::new(platform), None))
}
