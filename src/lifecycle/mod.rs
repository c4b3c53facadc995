//! Ticket Lifecycle Engine
//!
//! Turns reaction events into ticket channel creation and deletion.
//!
//! Per member and guild a ticket moves through
//! `NoTicket -> Pending -> Open -> Closing -> Closed`:
//!
//! - an open-marker reaction on a registered prompt retracts the reaction and
//!   asks the [`ChannelDirectory`] for the member's ticket channel. An
//!   existing channel is left alone and the member is told so.
//! - a close-marker reaction inside a ticket channel, from the guild owner or
//!   an administrator, posts a countdown and schedules the deletion on its
//!   own task. Anyone else is ignored.
//!
//! Failures are handled at the boundary of the transition that caused them:
//! logged, and reported to the member by a direct message that may itself
//! fail silently.

mod scheduler;
mod state;

pub use scheduler::CloseScheduler;
pub use state::{GuildState, TicketLedger, TicketRecord, TicketState};

use crate::config::{Markers, TicketSettings};
use crate::core::{
    Channel, ChannelId, EmbedBuilder, GuildId, MessageId, OutgoingMessage, TicketPrompt, User,
    UserId, colour,
};
use crate::directory::{ChannelDirectory, TicketChannelOutcome};
use crate::error::{BotError, Result};
use crate::platform::ChatPlatform;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A reaction added to a message in a guild channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: String,
    pub user: User,
}

/// What the engine did with a reaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Not ticket-relevant, or from a bot
    Ignored,
    TicketOpened(Channel),
    /// The member already had this ticket channel
    AlreadyOpen(Channel),
    OpenFailed(String),
    /// Close requested by someone who is neither owner nor administrator
    Unauthorized,
    CloseScheduled(ChannelId),
    /// The channel is already counting down
    AlreadyClosing(ChannelId),
}

pub struct TicketLifecycle {
    platform: Arc<dyn ChatPlatform>,
    directory: Arc<ChannelDirectory>,
    markers: Markers,
    settings: TicketSettings,
    grace: Duration,
    guilds: RwLock<HashMap<GuildId, Arc<GuildState>>>,
    scheduler: CloseScheduler,
}

impl std::fmt::Debug for TicketLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketLifecycle")
            .field("markers", &self.markers)
            .field("grace", &self.grace)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl TicketLifecycle {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        directory: Arc<ChannelDirectory>,
        markers: Markers,
        settings: TicketSettings,
    ) -> Self {
        let grace = Duration::from_secs(settings.close_grace_secs);
        Self {
            platform,
            directory,
            markers,
            settings,
            grace,
            guilds: RwLock::new(HashMap::new()),
            scheduler: CloseScheduler::new(),
        }
    }

    pub const fn settings(&self) -> &TicketSettings {
        &self.settings
    }

    /// State object of a guild, created on first use
    pub fn guild(&self, guild_id: GuildId) -> Arc<GuildState> {
        if let Some(state) = self
            .guilds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&guild_id)
        {
            return Arc::clone(state);
        }
        let mut guilds = self.guilds.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guilds.entry(guild_id).or_default())
    }

    pub fn ticket_state(&self, guild_id: GuildId, user_id: UserId) -> TicketState {
        self.guild(guild_id).ledger.state(user_id)
    }

    /// Post a ticket prompt into `channel_id` and register it
    pub async fn create_prompt(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        title: &str,
        description: &str,
    ) -> Result<TicketPrompt> {
        let open = &self.markers.open;
        let embed = EmbedBuilder::new()
            .title(format!("{open} {title}"))
            .description(description)
            .color(colour::GREEN)
            .field(
                "Instructions",
                format!("Réagissez avec {open} pour créer un ticket"),
                false,
            )
            .footer(&self.settings.prompt_footer)
            .build();

        let prompt_id = self
            .platform
            .send_message(channel_id, OutgoingMessage::embed(embed))
            .await?;
        self.platform.add_reaction(channel_id, prompt_id, open).await?;

        let prompt = TicketPrompt {
            prompt_id,
            guild_id,
            channel_id,
            title: title.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.guild(guild_id).registry.register(prompt.clone()).await;
        info!(
            "Ticket prompt '{}' posted as message {} in channel {}",
            title, prompt_id, channel_id
        );

        Ok(prompt)
    }

    /// Route a reaction through the state machine
    ///
    /// Errors are only returned while inspecting a close request; open
    /// requests report their failures to the member and return
    /// [`ReactionOutcome::OpenFailed`].
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> Result<ReactionOutcome> {
        if event.user.bot {
            return Ok(ReactionOutcome::Ignored);
        }

        let guild = self.guild(event.guild_id);
        if event.emoji == self.markers.open {
            if let Ok(prompt) = guild.registry.lookup(event.message_id).await {
                return Ok(self.open_ticket(&guild, &prompt, event).await);
            }
        }

        if event.emoji == self.markers.close {
            return self.close_ticket(guild, event).await;
        }

        Ok(ReactionOutcome::Ignored)
    }

    async fn open_ticket(
        &self,
        guild: &GuildState,
        prompt: &TicketPrompt,
        event: &ReactionEvent,
    ) -> ReactionOutcome {
        let user = &event.user;
        let began = guild.ledger.begin(user.id);
        debug!("Ticket request from {} on prompt {}", user.id, prompt.prompt_id);

        let outcome = match self.request_channel(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to create ticket for {}: {}", user.name, e);
                if began {
                    guild.ledger.revert(user.id);
                }
                self.notify(user.id, &format!("Erreur lors de la création du ticket: {e}"))
                    .await;
                return ReactionOutcome::OpenFailed(e.to_string());
            },
        };

        match outcome {
            TicketChannelOutcome::AlreadyExists(channel) => {
                // The existing channel is authoritative
                guild.ledger.reopen(user.id, channel.id);
                let notice = BotError::AlreadyExists {
                    channel: channel.name.clone(),
                }
                .user_message();
                self.notify(user.id, &notice).await;
                ReactionOutcome::AlreadyOpen(channel)
            },
            TicketChannelOutcome::Created(channel) => {
                guild.ledger.reopen(user.id, channel.id);
                match self.post_ticket_summary(prompt, user, &channel).await {
                    Ok(()) => {
                        self.notify(
                            user.id,
                            &format!("Votre ticket a été créé dans {}", channel.mention()),
                        )
                        .await;
                    },
                    Err(e) => {
                        error!("Failed to set up ticket channel {}: {}", channel.id, e);
                        self.notify(user.id, &format!("Erreur lors de la création du ticket: {e}"))
                            .await;
                    },
                }
                info!("Ticket #{} opened for {}", channel.name, user.name);
                ReactionOutcome::TicketOpened(channel)
            },
        }
    }

    async fn request_channel(&self, event: &ReactionEvent) -> Result<TicketChannelOutcome> {
        // Retract first so the prompt stays usable for everyone else
        self.platform
            .remove_reaction(
                event.channel_id,
                event.message_id,
                &event.emoji,
                event.user.id,
            )
            .await?;

        let category = self
            .directory
            .get_or_create_tickets_category(event.guild_id)
            .await?;
        self.directory
            .get_or_create_ticket_channel(event.guild_id, &category, &event.user)
            .await
    }

    async fn post_ticket_summary(
        &self,
        prompt: &TicketPrompt,
        requester: &User,
        channel: &Channel,
    ) -> Result<()> {
        let embed = EmbedBuilder::new()
            .title(format!("Ticket: {}", prompt.title))
            .description(format!(
                "Ticket créé par {}\n\n{}",
                requester.mention(),
                prompt.description
            ))
            .color(colour::GREEN)
            .footer(format!(
                "Réagissez avec {} pour fermer le ticket",
                self.markers.close
            ))
            .timestamp(Utc::now())
            .build();

        let message_id = self
            .platform
            .send_message(channel.id, OutgoingMessage::embed(embed))
            .await?;
        self.platform
            .add_reaction(channel.id, message_id, &self.markers.close)
            .await
    }

    async fn close_ticket(
        &self,
        guild: Arc<GuildState>,
        event: &ReactionEvent,
    ) -> Result<ReactionOutcome> {
        let channel = self.platform.channel(event.channel_id).await?;
        if !self.directory.is_ticket_channel(&channel) {
            return Ok(ReactionOutcome::Ignored);
        }

        if !self.may_close(event.guild_id, event.user.id).await? {
            debug!(
                "Ignoring close request from {} on #{}: not owner or administrator",
                event.user.id, channel.name
            );
            return Ok(ReactionOutcome::Unauthorized);
        }

        if !self.scheduler.reserve(channel.id) {
            debug!("Ticket #{} is already closing", channel.name);
            return Ok(ReactionOutcome::AlreadyClosing(channel.id));
        }

        let countdown = format!(
            "Le ticket va être fermé dans {} secondes...",
            self.grace.as_secs()
        );
        if let Err(e) = self
            .platform
            .send_message(channel.id, OutgoingMessage::text(countdown))
            .await
        {
            self.scheduler.release(channel.id);
            return Err(e);
        }

        guild.ledger.closing(channel.id);
        info!(
            "Ticket #{} closing in {:?} (requested by {})",
            channel.name, self.grace, event.user.name
        );

        let directory = Arc::clone(&self.directory);
        let channel_id = channel.id;
        self.scheduler.arm(channel_id, self.grace, async move {
            if directory.delete_channel(channel_id).await {
                if let Some(owner) = guild.ledger.closed(channel_id) {
                    info!("Ticket of user {} closed", owner);
                }
            } else {
                warn!("Ticket channel {} could not be deleted", channel_id);
                guild.ledger.abort_closing(channel_id);
            }
        });

        Ok(ReactionOutcome::CloseScheduled(channel_id))
    }

    /// Guild owner or administrator
    async fn may_close(&self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        if self.platform.guild(guild_id).await?.owner_id == user_id {
            return Ok(true);
        }
        self.platform.is_administrator(guild_id, user_id).await
    }

    async fn notify(&self, user_id: UserId, content: &str) {
        if let Err(e) = self.platform.send_direct_message(user_id, content).await {
            debug!("Could not send direct message to {}: {}", user_id, e);
        }
    }

    /// Number of deletions still counting down
    pub fn pending_closures(&self) -> usize {
        self.scheduler.pending()
    }

    /// Wait for scheduled deletions; used on shutdown
    pub async fn shutdown(&self) {
        let pending = self.scheduler.pending();
        if pending > 0 {
            info!("Waiting for {} scheduled ticket deletion(s)", pending);
        }
        self.scheduler.drain().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::platform::MockChatPlatform;
    use crate::test_utils::{ADMIN, GUILD, MEMBER, OWNER, TestGuild};

    #[tokio::test]
    async fn test_open_reaction_creates_ticket_and_retracts_reaction() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);

        let outcome = guild.react(&prompt, "🎫", &member).await;
        let ReactionOutcome::TicketOpened(channel) = outcome else {
            panic!("expected an opened ticket");
        };

        assert_eq!(channel.name, "ticket-member");
        assert_eq!(guild.platform.channels_named(GUILD, "ticket-member").len(), 1);
        assert!(
            !guild
                .platform
                .reactions_on(prompt.prompt_id)
                .contains(&("🎫".to_string(), member.id))
        );
        assert_eq!(
            guild.engine.ticket_state(GUILD, member.id),
            TicketState::Open
        );

        let summary = guild.platform.messages_in(channel.id);
        assert_eq!(summary.len(), 1);
        assert!(summary[0].text().contains(&member.mention()));
        assert!(summary[0].text().contains("Besoin d'aide"));
        assert!(
            guild
                .platform
                .reactions_on(summary[0].id)
                .contains(&("🔒".to_string(), guild.platform.bot().id))
        );

        let dms = guild.platform.direct_messages_to(member.id);
        assert_eq!(dms, vec![format!("Votre ticket a été créé dans <#{}>", channel.id)]);
    }

    #[tokio::test]
    async fn test_second_reaction_does_not_duplicate_ticket() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);

        guild.react(&prompt, "🎫", &member).await;
        let outcome = guild.react(&prompt, "🎫", &member).await;

        assert!(matches!(outcome, ReactionOutcome::AlreadyOpen(_)));
        assert_eq!(guild.platform.channels_named(GUILD, "ticket-member").len(), 1);
        let dms = guild.platform.direct_messages_to(member.id);
        assert_eq!(dms.last().map(String::as_str), Some("Vous avez déjà un ticket ouvert!"));
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::Open);
    }

    #[tokio::test]
    async fn test_bot_and_unrelated_reactions_are_ignored() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;

        let bot = guild.platform.bot().clone();
        assert_eq!(guild.react(&prompt, "🎫", &bot).await, ReactionOutcome::Ignored);

        let member = guild.user(MEMBER);
        assert_eq!(guild.react(&prompt, "👍", &member).await, ReactionOutcome::Ignored);
        assert!(guild.platform.channels_named(GUILD, "ticket-member").is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_message_is_ignored() {
        let guild = TestGuild::new();
        let general = guild.platform.add_text_channel(GUILD, "general");
        let event = ReactionEvent {
            guild_id: GUILD,
            channel_id: general.id,
            message_id: MessageId::new(424_242),
            emoji: "🎫".to_string(),
            user: guild.user(MEMBER),
        };

        assert_eq!(
            guild.engine.handle_reaction(&event).await.unwrap(),
            ReactionOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_creation_failure_is_reported_by_direct_message() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);
        guild.platform.fail_on("create_channel");

        let outcome = guild.react(&prompt, "🎫", &member).await;

        assert!(matches!(outcome, ReactionOutcome::OpenFailed(_)));
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::NoTicket);
        let dms = guild.platform.direct_messages_to(member.id);
        assert_eq!(dms.len(), 1);
        assert!(dms[0].starts_with("Erreur lors de la création du ticket"));
    }

    #[tokio::test]
    async fn test_failed_error_notice_is_silent() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        guild.platform.fail_on("create_channel");
        guild.platform.fail_on("send_direct_message");

        let outcome = guild.react(&prompt, "🎫", &guild.user(MEMBER)).await;
        assert!(matches!(outcome, ReactionOutcome::OpenFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_close_counts_down_then_deletes() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);
        let ReactionOutcome::TicketOpened(channel) = guild.react(&prompt, "🎫", &member).await
        else {
            panic!("expected an opened ticket");
        };
        let start = tokio::time::Instant::now();

        let outcome = guild.react_in(&channel, "🔒", &guild.user(ADMIN)).await;
        assert_eq!(outcome, ReactionOutcome::CloseScheduled(channel.id));
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::Closing);

        let countdowns: Vec<_> = guild
            .platform
            .messages_in(channel.id)
            .into_iter()
            .filter(|sent| sent.text().starts_with("Le ticket va être fermé"))
            .collect();
        assert_eq!(countdowns.len(), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert!(guild.platform.deleted_channels().is_empty());

        guild.engine.shutdown().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(guild.platform.deleted_channels(), vec![channel.id]);
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::NoTicket);
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_may_close_and_repeat_close_is_ignored() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let ReactionOutcome::TicketOpened(channel) =
            guild.react(&prompt, "🎫", &guild.user(MEMBER)).await
        else {
            panic!("expected an opened ticket");
        };

        let owner = guild.user(OWNER);
        assert_eq!(
            guild.react_in(&channel, "🔒", &owner).await,
            ReactionOutcome::CloseScheduled(channel.id)
        );
        assert_eq!(
            guild.react_in(&channel, "🔒", &guild.user(ADMIN)).await,
            ReactionOutcome::AlreadyClosing(channel.id)
        );

        guild.engine.shutdown().await;
        assert_eq!(guild.platform.deleted_channels().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_close_is_ignored() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);
        let ReactionOutcome::TicketOpened(channel) = guild.react(&prompt, "🎫", &member).await
        else {
            panic!("expected an opened ticket");
        };
        let before = guild.platform.messages_in(channel.id).len();

        let outcome = guild.react_in(&channel, "🔒", &member).await;

        assert_eq!(outcome, ReactionOutcome::Unauthorized);
        assert_eq!(guild.engine.pending_closures(), 0);
        assert_eq!(guild.platform.messages_in(channel.id).len(), before);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(guild.platform.deleted_channels().is_empty());
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::Open);
    }

    #[tokio::test]
    async fn test_close_marker_outside_ticket_channel_is_ignored() {
        let guild = TestGuild::new();
        let general = guild.platform.add_text_channel(GUILD, "general");

        let outcome = guild.react_in(&general, "🔒", &guild.user(ADMIN)).await;

        assert_eq!(outcome, ReactionOutcome::Ignored);
        assert!(guild.platform.messages_in(general.id).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deletion_is_logged_not_fatal() {
        let guild = TestGuild::new();
        let ticket = guild.platform.add_text_channel(GUILD, "ticket-legacy");
        guild.platform.fail_on("delete_channel");

        let outcome = guild.react_in(&ticket, "🔒", &guild.user(ADMIN)).await;
        assert_eq!(outcome, ReactionOutcome::CloseScheduled(ticket.id));

        guild.engine.shutdown().await;
        assert!(guild.platform.deleted_channels().is_empty());
        assert_eq!(guild.engine.pending_closures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticket_deleted_elsewhere_can_be_reopened_and_closed() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);
        let ReactionOutcome::TicketOpened(first) = guild.react(&prompt, "🎫", &member).await
        else {
            panic!("expected an opened ticket");
        };
        guild.platform.delete_channel(first.id).await.unwrap();

        let ReactionOutcome::TicketOpened(second) = guild.react(&prompt, "🎫", &member).await
        else {
            panic!("expected a new ticket");
        };
        assert_ne!(first.id, second.id);
        let record = guild.engine.guild(GUILD).ledger.record(member.id).unwrap();
        assert_eq!(record.channel_id, Some(second.id));

        assert_eq!(
            guild.react_in(&second, "🔒", &guild.user(ADMIN)).await,
            ReactionOutcome::CloseScheduled(second.id)
        );
        guild.engine.shutdown().await;

        assert_eq!(guild.platform.deleted_channels(), vec![first.id, second.id]);
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::NoTicket);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deletion_reverts_ticket_to_open() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;
        let member = guild.user(MEMBER);
        let ReactionOutcome::TicketOpened(channel) = guild.react(&prompt, "🎫", &member).await
        else {
            panic!("expected an opened ticket");
        };
        guild.platform.fail_on("delete_channel");

        guild.react_in(&channel, "🔒", &guild.user(ADMIN)).await;
        guild.engine.shutdown().await;
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::Open);

        guild.platform.clear_failures();
        assert_eq!(
            guild.react_in(&channel, "🔒", &guild.user(ADMIN)).await,
            ReactionOutcome::CloseScheduled(channel.id)
        );
        guild.engine.shutdown().await;
        assert_eq!(guild.platform.deleted_channels(), vec![channel.id]);
        assert_eq!(guild.engine.ticket_state(GUILD, member.id), TicketState::NoTicket);
    }

    #[tokio::test]
    async fn test_create_prompt_registers_and_reacts() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Besoin d'aide").await;

        let registry = &guild.engine.guild(GUILD).registry;
        assert_eq!(registry.lookup(prompt.prompt_id).await.unwrap(), prompt);

        let posted = guild.platform.messages_in(prompt.channel_id);
        let embed = posted[0].message.embed.as_ref().unwrap();
        assert_eq!(embed.title, "🎫 Support");
        assert_eq!(embed.fields[0].name, "Instructions");
        assert_eq!(embed.footer.as_deref(), Some("ArkeonProject - Système de tickets"));
        assert_eq!(
            guild.platform.reactions_on(prompt.prompt_id),
            vec![("🎫".to_string(), guild.platform.bot().id)]
        );
    }

    #[tokio::test]
    async fn test_prompt_is_not_registered_when_posting_fails() {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_send_message()
            .returning(|_, _| Err(BotError::channel_op("send_message", "Missing Access")));
        platform.expect_add_reaction().never();

        let platform: Arc<dyn ChatPlatform> = Arc::new(platform);
        let config = BotConfig::default();
        let directory = Arc::new(ChannelDirectory::new(
            Arc::clone(&platform),
            config.channels.clone(),
        ));
        let engine = TicketLifecycle::new(platform, directory, config.markers, config.tickets);

        let result = engine
            .create_prompt(GUILD, ChannelId::new(5), "Support", "Besoin d'aide")
            .await;

        assert!(matches!(result, Err(BotError::ChannelOperationFailed { .. })));
        assert!(engine.guild(GUILD).registry.is_empty().await);
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TicketLifecycle>();
    }
}
