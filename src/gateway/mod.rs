//! Gateway front-end
//!
//! Inbound platform events arrive here, one JSON object per line, and are
//! routed to the core. Every event runs on its own task behind an error
//! boundary: a failure is logged and never stops the dispatcher.

mod commands;
mod feed;

pub use commands::{Command, CommandHandler};
pub use feed::{read_events, seed_simulator};

use crate::core::{Channel, GuildInfo, Interaction};
use crate::directory::ChannelDirectory;
use crate::error::{BotError, Result};
use crate::lifecycle::{ReactionEvent, ReactionOutcome, TicketLifecycle};
use crate::panel::PanelBridge;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A guild the bot is a member of, as announced on connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyGuild {
    #[serde(flatten)]
    pub info: GuildInfo,
    /// Channels already present in the guild
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Connection established
    Ready { guilds: Vec<ReadyGuild> },
    ReactionAdded(ReactionEvent),
    Command {
        interaction: Interaction,
        command: Command,
    },
}

impl GatewayEvent {
    /// Decode one line of the event feed
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| BotError::InvalidEvent(e.to_string()))
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::ReactionAdded(_) => "reaction_added",
            Self::Command { .. } => "command",
        }
    }
}

/// Routes gateway events to the core
#[derive(Clone)]
pub struct EventDispatcher {
    directory: Arc<ChannelDirectory>,
    engine: Arc<TicketLifecycle>,
    commands: Arc<CommandHandler>,
    panel: Option<PanelBridge>,
}

impl EventDispatcher {
    pub fn new(
        directory: Arc<ChannelDirectory>,
        engine: Arc<TicketLifecycle>,
        commands: Arc<CommandHandler>,
    ) -> Self {
        Self {
            directory,
            engine,
            commands,
            panel: None,
        }
    }

    /// Publish channel lists to a control panel
    #[must_use]
    pub fn with_panel(mut self, panel: PanelBridge) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Process events until the sender side closes, then wait for the
    /// tasks still in flight
    pub async fn run(&self, mut events: mpsc::Receiver<GatewayEvent>) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let dispatcher = self.clone();
                    tasks.spawn(async move { dispatcher.dispatch(event).await });
                },
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    report_task(finished);
                },
            }
        }

        while let Some(finished) = tasks.join_next().await {
            report_task(finished);
        }
    }

    /// Handle one event; errors are logged, never returned
    pub async fn dispatch(&self, event: GatewayEvent) {
        let kind = event.kind();
        if let Err(e) = self.route(event).await {
            error!("Error handling {} event: {}", kind, e);
        }
    }

    async fn route(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::Ready { guilds } => {
                self.on_ready(&guilds).await;
                Ok(())
            },
            GatewayEvent::ReactionAdded(reaction) => {
                let outcome = self.engine.handle_reaction(&reaction).await?;
                if outcome != ReactionOutcome::Ignored {
                    debug!("Reaction {} by {}: {:?}", reaction.emoji, reaction.user.id, outcome);
                }
                Ok(())
            },
            GatewayEvent::Command {
                interaction,
                command,
            } => {
                info!(
                    "/{} invoked by {} in guild {}",
                    command.name(),
                    interaction.member.user.name,
                    interaction.guild_id
                );
                self.commands.handle(&interaction, &command).await;
                Ok(())
            },
        }
    }

    async fn on_ready(&self, guilds: &[ReadyGuild]) {
        info!("Bot connected to {} guild(s)", guilds.len());
        for guild in guilds {
            info!("- {} (ID: {})", guild.info.name, guild.info.id);
        }

        for guild in guilds {
            let guild_id = guild.info.id;
            if let Err(e) = self.directory.get_or_create_announcement_channel(guild_id).await {
                error!(
                    "Failed to set up the announcement channel in {}: {}",
                    guild.info.name, e
                );
            }

            if let Some(panel) = &self.panel {
                match self.directory.text_channels(guild_id).await {
                    Ok(channels) => panel.notify_channels(guild_id, channels),
                    Err(e) => warn!("Could not list channels of {}: {}", guild.info.name, e),
                }
            }
        }
    }
}

fn report_task(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!("Event task aborted: {}", e);
    }
}
