//! Command-dispatch adapter
//!
//! Turns `announce` and `ticket` invocations into core calls and always
//! answers the invoker with an ephemeral acknowledgement.

use crate::announce::AnnouncementPublisher;
use crate::core::Interaction;
use crate::error::BotError;
use crate::lifecycle::TicketLifecycle;
use crate::platform::ChatPlatform;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// Administrative commands exposed to guild members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    /// Post into the announcement channel
    Announce { title: String, content: String },
    /// Post a ticket prompt into the invoking channel
    Ticket { title: String, description: String },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Announce { .. } => "announce",
            Self::Ticket { .. } => "ticket",
        }
    }
}

pub struct CommandHandler {
    platform: Arc<dyn ChatPlatform>,
    engine: Arc<TicketLifecycle>,
    publisher: Arc<AnnouncementPublisher>,
}

impl CommandHandler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        engine: Arc<TicketLifecycle>,
        publisher: Arc<AnnouncementPublisher>,
    ) -> Self {
        Self {
            platform,
            engine,
            publisher,
        }
    }

    /// Run a command and acknowledge it; returns the acknowledgement text
    pub async fn handle(&self, interaction: &Interaction, command: &Command) -> String {
        let reply = match command {
            Command::Announce { title, content } => self.announce(interaction, title, content).await,
            Command::Ticket { title, description } => {
                self.ticket(interaction, title, description).await
            },
        };

        if let Err(e) = self.platform.reply_ephemeral(interaction, &reply).await {
            warn!(
                "Could not acknowledge /{} for {}: {}",
                command.name(),
                interaction.member.user.id,
                e
            );
        }
        reply
    }

    async fn announce(&self, interaction: &Interaction, title: &str, content: &str) -> String {
        match self
            .publisher
            .publish(interaction.guild_id, &interaction.member, title, content)
            .await
        {
            Ok(_) => "✅ Annonce envoyée avec succès!".to_string(),
            Err(e @ BotError::Unauthorized { .. }) => e.user_message(),
            Err(e) => {
                error!("Announcement failed: {}", e);
                format!("❌ Erreur lors de l'envoi de l'annonce: {e}")
            },
        }
    }

    async fn ticket(&self, interaction: &Interaction, title: &str, description: &str) -> String {
        if self.engine.settings().restrict_prompts_to_admins {
            match self
                .publisher
                .is_privileged(interaction.guild_id, &interaction.member)
                .await
            {
                Ok(true) => {},
                Ok(false) => {
                    return BotError::Unauthorized {
                        action: "ticket".to_string(),
                    }
                    .user_message();
                },
                Err(e) => {
                    error!("Could not check privileges for /ticket: {}", e);
                    return format!("❌ Erreur lors de la création du ticket: {e}");
                },
            }
        }

        match self
            .engine
            .create_prompt(interaction.guild_id, interaction.channel_id, title, description)
            .await
        {
            Ok(_) => "✅ Ticket créé avec succès!".to_string(),
            Err(e) => {
                error!("Ticket prompt creation failed: {}", e);
                format!("❌ Erreur lors de la création du ticket: {e}")
            },
        }
    }
}
