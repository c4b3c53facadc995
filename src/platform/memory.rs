//! In-memory guild simulator
//!
//! Implements [`ChatPlatform`] over plain collections so the core can run
//! without a network connection (`poster-bot run --dry-run`) and so tests can
//! inspect every side effect. Operations can be slowed down with
//! [`InMemoryPlatform::with_latency`] and made to fail with
//! [`InMemoryPlatform::fail_on`].

use super::ChatPlatform;
use crate::core::{
    Channel, ChannelId, ChannelKind, GuildId, GuildInfo, Interaction, Member, MessageId,
    NewChannel, OutgoingMessage, PermissionOverwrite, User, UserId,
};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A message posted through the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub message: OutgoingMessage,
}

impl SentMessage {
    /// Plain text content, or the embed title and description
    pub fn text(&self) -> String {
        match (&self.message.content, &self.message.embed) {
            (Some(content), _) => content.clone(),
            (None, Some(embed)) => format!("{}\n{}", embed.title, embed.description),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug)]
struct SimGuild {
    info: GuildInfo,
    admins: HashSet<UserId>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    guilds: HashMap<GuildId, SimGuild>,
    channels: BTreeMap<ChannelId, Channel>,
    overwrites: HashMap<ChannelId, Vec<PermissionOverwrite>>,
    messages: Vec<SentMessage>,
    reactions: HashMap<MessageId, Vec<(String, UserId)>>,
    direct_messages: Vec<(UserId, String)>,
    ephemeral_replies: Vec<(String, String)>,
    deleted: Vec<ChannelId>,
    failing: HashSet<String>,
}

impl Inner {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn guild_mut(&mut self, guild_id: GuildId, auto_provision: bool) -> Result<&mut SimGuild> {
        if auto_provision && !self.guilds.contains_key(&guild_id) {
            self.guilds.insert(
                guild_id,
                SimGuild {
                    info: GuildInfo {
                        id: guild_id,
                        name: format!("guild-{guild_id}"),
                        owner_id: UserId::new(0),
                    },
                    admins: HashSet::new(),
                },
            );
        }
        self.guilds
            .get_mut(&guild_id)
            .ok_or_else(|| BotError::channel_op("guild", format!("unknown guild {guild_id}")))
    }
}

/// Simulated chat platform
#[derive(Debug)]
pub struct InMemoryPlatform {
    bot: User,
    latency: Option<Duration>,
    auto_provision: bool,
    inner: Mutex<Inner>,
}

impl InMemoryPlatform {
    /// Create a simulator in which `bot` is the bot's own account
    pub fn new(bot: User) -> Self {
        Self {
            bot,
            latency: None,
            auto_provision: false,
            inner: Mutex::new(Inner {
                next_id: 1000,
                ..Inner::default()
            }),
        }
    }

    /// Simulator that creates unknown guilds on first reference
    pub fn permissive(bot: User) -> Self {
        Self {
            auto_provision: true,
            ..Self::new(bot)
        }
    }

    /// Delay every operation, widening race windows
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self, operation: &str) -> Result<()> {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if self.state().failing.contains(operation) {
            return Err(BotError::channel_op(operation, "simulated failure"));
        }
        Ok(())
    }

    /// Register a guild, replacing any previous definition
    pub fn provision_guild(&self, info: GuildInfo) {
        let mut state = self.state();
        let admins = state
            .guilds
            .remove(&info.id)
            .map(|guild| guild.admins)
            .unwrap_or_default();
        state.guilds.insert(info.id, SimGuild { info, admins });
    }

    /// Record a member's administrator flag
    pub fn observe_member(&self, guild_id: GuildId, member: &Member) {
        let auto_provision = self.auto_provision;
        let mut state = self.state();
        if let Ok(guild) = state.guild_mut(guild_id, auto_provision) {
            if member.administrator {
                guild.admins.insert(member.user.id);
            } else {
                guild.admins.remove(&member.user.id);
            }
        }
    }

    pub fn add_admin(&self, guild_id: GuildId, user_id: UserId) {
        if let Some(guild) = self.state().guilds.get_mut(&guild_id) {
            guild.admins.insert(user_id);
        }
    }

    /// Create a text channel directly, bypassing the directory
    pub fn add_text_channel(&self, guild_id: GuildId, name: &str) -> Channel {
        let mut state = self.state();
        let id = ChannelId::new(state.allocate_id());
        let channel = Channel {
            id,
            guild_id,
            name: name.to_string(),
            kind: ChannelKind::Text,
            parent_id: None,
            topic: None,
        };
        state.channels.insert(id, channel.clone());
        channel
    }

    /// Mirror a channel that already exists on the real platform
    pub fn insert_channel(&self, channel: Channel) {
        let mut state = self.state();
        state.next_id = state.next_id.max(channel.id.get());
        state.channels.insert(channel.id, channel);
    }

    /// Make every call of `operation` fail until [`Self::clear_failures`]
    pub fn fail_on(&self, operation: &str) {
        self.state().failing.insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Simulate a member reacting to a message
    pub fn user_react(&self, message_id: MessageId, emoji: &str, user_id: UserId) {
        self.state()
            .reactions
            .entry(message_id)
            .or_default()
            .push((emoji.to_string(), user_id));
    }

    /// Live channels of a guild with the given name
    pub fn channels_named(&self, guild_id: GuildId, name: &str) -> Vec<Channel> {
        self.state()
            .channels
            .values()
            .filter(|channel| channel.guild_id == guild_id && channel.name == name)
            .cloned()
            .collect()
    }

    pub fn messages_in(&self, channel_id: ChannelId) -> Vec<SentMessage> {
        self.state()
            .messages
            .iter()
            .filter(|sent| sent.channel_id == channel_id)
            .cloned()
            .collect()
    }

    pub fn direct_messages_to(&self, user_id: UserId) -> Vec<String> {
        self.state()
            .direct_messages
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// `(interaction id, content)` of every ephemeral reply
    pub fn ephemeral_replies(&self) -> Vec<(String, String)> {
        self.state().ephemeral_replies.clone()
    }

    pub fn reactions_on(&self, message_id: MessageId) -> Vec<(String, UserId)> {
        self.state()
            .reactions
            .get(&message_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn overwrites_of(&self, channel_id: ChannelId) -> Vec<PermissionOverwrite> {
        self.state()
            .overwrites
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.state().deleted.clone()
    }

    pub fn bot(&self) -> &User {
        &self.bot
    }
}

#[async_trait]
impl ChatPlatform for InMemoryPlatform {
    async fn current_user(&self) -> Result<User> {
        Ok(self.bot.clone())
    }

    async fn guild(&self, guild_id: GuildId) -> Result<GuildInfo> {
        self.round_trip("guild").await?;
        let auto_provision = self.auto_provision;
        let mut state = self.state();
        Ok(state.guild_mut(guild_id, auto_provision)?.info.clone())
    }

    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        self.round_trip("is_administrator").await?;
        let auto_provision = self.auto_provision;
        let mut state = self.state();
        Ok(state
            .guild_mut(guild_id, auto_provision)?
            .admins
            .contains(&user_id))
    }

    async fn channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        self.round_trip("channels").await?;
        Ok(self
            .state()
            .channels
            .values()
            .filter(|channel| channel.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Channel> {
        self.round_trip("channel").await?;
        self.state()
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| BotError::channel_op("channel", format!("unknown channel {channel_id}")))
    }

    async fn create_channel(&self, guild_id: GuildId, request: NewChannel) -> Result<Channel> {
        self.round_trip("create_channel").await?;
        let auto_provision = self.auto_provision;
        let mut state = self.state();
        state.guild_mut(guild_id, auto_provision)?;
        let id = ChannelId::new(state.allocate_id());
        let channel = Channel {
            id,
            guild_id,
            name: request.name,
            kind: request.kind,
            parent_id: request.parent_id,
            topic: request.topic,
        };
        state.channels.insert(id, channel.clone());
        state.overwrites.insert(id, request.overwrites);
        Ok(channel)
    }

    async fn edit_channel_permissions(
        &self,
        channel: &Channel,
        overwrites: &[PermissionOverwrite],
    ) -> Result<()> {
        self.round_trip("edit_channel_permissions").await?;
        let mut state = self.state();
        if !state.channels.contains_key(&channel.id) {
            return Err(BotError::channel_op(
                "edit_channel_permissions",
                format!("unknown channel {}", channel.id),
            ));
        }
        state.overwrites.insert(channel.id, overwrites.to_vec());
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId> {
        self.round_trip("send_message").await?;
        let mut state = self.state();
        if !state.channels.contains_key(&channel_id) {
            return Err(BotError::channel_op(
                "send_message",
                format!("unknown channel {channel_id}"),
            ));
        }
        let id = MessageId::new(state.allocate_id());
        state.messages.push(SentMessage {
            id,
            channel_id,
            message,
        });
        Ok(id)
    }

    async fn add_reaction(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()> {
        self.round_trip("add_reaction").await?;
        let bot_id = self.bot.id;
        self.state()
            .reactions
            .entry(message_id)
            .or_default()
            .push((emoji.to_string(), bot_id));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()> {
        self.round_trip("remove_reaction").await?;
        if let Some(reactions) = self.state().reactions.get_mut(&message_id) {
            reactions.retain(|(glyph, reactor)| !(glyph == emoji && *reactor == user_id));
        }
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        self.round_trip("delete_channel").await?;
        let mut state = self.state();
        if state.channels.remove(&channel_id).is_none() {
            return Err(BotError::channel_op(
                "delete_channel",
                format!("unknown channel {channel_id}"),
            ));
        }
        state.overwrites.remove(&channel_id);
        state.deleted.push(channel_id);
        Ok(())
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()> {
        self.round_trip("send_direct_message").await?;
        self.state()
            .direct_messages
            .push((user_id, content.to_string()));
        Ok(())
    }

    async fn reply_ephemeral(&self, interaction: &Interaction, content: &str) -> Result<()> {
        self.round_trip("reply_ephemeral").await?;
        self.state()
            .ephemeral_replies
            .push((interaction.id.clone(), content.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelBuilder;

    fn platform() -> InMemoryPlatform {
        let platform = InMemoryPlatform::new(User {
            bot: true,
            ..User::new(1, "poster-bot")
        });
        platform.provision_guild(GuildInfo {
            id: GuildId::new(10),
            name: "Arkeon".to_string(),
            owner_id: UserId::new(2),
        });
        platform
    }

    #[tokio::test]
    async fn test_create_and_delete_channel() {
        let platform = platform();
        let channel = platform
            .create_channel(GuildId::new(10), ChannelBuilder::text("general").build())
            .await
            .unwrap();

        assert_eq!(platform.channels_named(GuildId::new(10), "general").len(), 1);
        platform.delete_channel(channel.id).await.unwrap();
        assert!(platform.channels_named(GuildId::new(10), "general").is_empty());
        assert_eq!(platform.deleted_channels(), vec![channel.id]);

        // Deleting twice reports the missing channel
        assert!(platform.delete_channel(channel.id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_guild_is_rejected_unless_permissive() {
        let strict = platform();
        assert!(strict.guild(GuildId::new(99)).await.is_err());

        let permissive = InMemoryPlatform::permissive(User::new(1, "poster-bot"));
        let info = permissive.guild(GuildId::new(99)).await.unwrap();
        assert_eq!(info.id, GuildId::new(99));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let platform = platform();
        platform.fail_on("send_direct_message");
        assert!(
            platform
                .send_direct_message(UserId::new(3), "hello")
                .await
                .is_err()
        );

        platform.clear_failures();
        platform
            .send_direct_message(UserId::new(3), "hello")
            .await
            .unwrap();
        assert_eq!(platform.direct_messages_to(UserId::new(3)), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_remove_reaction_only_removes_that_user() {
        let platform = platform();
        let message = MessageId::new(500);
        platform.user_react(message, "🎫", UserId::new(3));
        platform.user_react(message, "🎫", UserId::new(4));

        platform
            .remove_reaction(ChannelId::new(1), message, "🎫", UserId::new(3))
            .await
            .unwrap();

        assert_eq!(
            platform.reactions_on(message),
            vec![("🎫".to_string(), UserId::new(4))]
        );
    }

    #[tokio::test]
    async fn test_observe_member_tracks_administrators() {
        let platform = platform();
        let mut member = Member::new(User::new(3, "carol"), true);
        platform.observe_member(GuildId::new(10), &member);
        assert!(
            platform
                .is_administrator(GuildId::new(10), UserId::new(3))
                .await
                .unwrap()
        );

        member.administrator = false;
        platform.observe_member(GuildId::new(10), &member);
        assert!(
            !platform
                .is_administrator(GuildId::new(10), UserId::new(3))
                .await
                .unwrap()
        );
    }
}
