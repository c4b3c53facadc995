//! Test utilities for poster-bot
//!
//! This module provides a ready-made simulated guild so tests across the
//! crate do not each rebuild the platform, directory and engine.

#![cfg(test)]

use crate::announce::AnnouncementPublisher;
use crate::config::BotConfig;
use crate::core::{
    Channel, GuildId, GuildInfo, Member, MessageId, TicketPrompt, User, UserId,
};
use crate::directory::ChannelDirectory;
use crate::lifecycle::{ReactionEvent, ReactionOutcome, TicketLifecycle};
use crate::platform::{ChatPlatform, InMemoryPlatform};
use std::sync::Arc;

pub const GUILD: GuildId = GuildId::new(10);
pub const BOT: UserId = UserId::new(1);
pub const OWNER: UserId = UserId::new(2);
pub const ADMIN: UserId = UserId::new(3);
pub const MEMBER: UserId = UserId::new(4);

/// A guild with an owner, an administrator, a plain member and a
/// `#support` channel, wired to a fresh engine
pub struct TestGuild {
    pub config: BotConfig,
    pub platform: Arc<InMemoryPlatform>,
    pub directory: Arc<ChannelDirectory>,
    pub engine: Arc<TicketLifecycle>,
    pub publisher: Arc<AnnouncementPublisher>,
    pub support: Channel,
}

impl TestGuild {
    pub fn new() -> Self {
        let platform = InMemoryPlatform::new(User {
            bot: true,
            ..User::new(BOT, "poster-bot")
        });
        platform.provision_guild(GuildInfo {
            id: GUILD,
            name: "Arkeon".to_string(),
            owner_id: OWNER,
        });
        platform.add_admin(GUILD, ADMIN);
        let support = platform.add_text_channel(GUILD, "support");

        let config = BotConfig::default();
        let platform = Arc::new(platform);
        let shared: Arc<dyn ChatPlatform> = platform.clone();
        let directory = Arc::new(ChannelDirectory::new(
            Arc::clone(&shared),
            config.channels.clone(),
        ));
        let engine = Arc::new(TicketLifecycle::new(
            Arc::clone(&shared),
            Arc::clone(&directory),
            config.markers.clone(),
            config.tickets.clone(),
        ));
        let publisher = Arc::new(AnnouncementPublisher::new(shared, Arc::clone(&directory)));

        Self {
            config,
            platform,
            directory,
            engine,
            publisher,
            support,
        }
    }

    pub fn user(&self, id: UserId) -> User {
        let name = match id {
            BOT => "poster-bot",
            OWNER => "owner",
            ADMIN => "admin",
            MEMBER => "member",
            _ => "someone",
        };
        User {
            bot: id == BOT,
            ..User::new(id, name)
        }
    }

    /// The user as a guild member; the owner and the admin are administrators
    pub fn member(&self, id: UserId) -> Member {
        Member::new(self.user(id), id == OWNER || id == ADMIN)
    }

    /// Post a ticket prompt into `#support`
    pub async fn prompt(&self, title: &str, description: &str) -> TicketPrompt {
        self.engine
            .create_prompt(GUILD, self.support.id, title, description)
            .await
            .expect("Failed to create prompt")
    }

    /// React to a prompt as `user`
    pub async fn react(&self, prompt: &TicketPrompt, emoji: &str, user: &User) -> ReactionOutcome {
        self.platform.user_react(prompt.prompt_id, emoji, user.id);
        self.engine
            .handle_reaction(&ReactionEvent {
                guild_id: GUILD,
                channel_id: prompt.channel_id,
                message_id: prompt.prompt_id,
                emoji: emoji.to_string(),
                user: user.clone(),
            })
            .await
            .expect("Failed to handle reaction")
    }

    /// React to the latest message of `channel` as `user`
    pub async fn react_in(&self, channel: &Channel, emoji: &str, user: &User) -> ReactionOutcome {
        let message_id = self
            .platform
            .messages_in(channel.id)
            .last()
            .map_or(MessageId::new(1), |sent| sent.id);
        self.platform.user_react(message_id, emoji, user.id);
        self.engine
            .handle_reaction(&ReactionEvent {
                guild_id: GUILD,
                channel_id: channel.id,
                message_id,
                emoji: emoji.to_string(),
                user: user.clone(),
            })
            .await
            .expect("Failed to handle reaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_fixture() {
        let guild = TestGuild::new();
        assert_eq!(guild.platform.channels_named(GUILD, "support").len(), 1);
        assert!(guild.member(ADMIN).administrator);
        assert!(!guild.member(MEMBER).administrator);
        assert!(guild.user(BOT).bot);
    }

    #[tokio::test]
    async fn test_prompt_fixture() {
        let guild = TestGuild::new();
        let prompt = guild.prompt("Support", "Aide").await;
        assert_eq!(prompt.channel_id, guild.support.id);
    }
}
