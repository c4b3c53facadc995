//! Port to the chat platform
//!
//! Everything the core does to a guild goes through [`ChatPlatform`]. Two
//! implementations ship with the crate: [`DiscordRest`], talking to the
//! platform's REST API, and [`InMemoryPlatform`], a simulated guild used for
//! dry runs and tests.

mod discord;
mod memory;

pub use discord::DiscordRest;
pub use memory::{InMemoryPlatform, SentMessage};

use crate::core::{
    Channel, ChannelId, GuildId, GuildInfo, Interaction, MessageId, NewChannel, OutgoingMessage,
    PermissionOverwrite, User, UserId,
};
use crate::error::Result;
use async_trait::async_trait;

/// REST-style operations consumed from the chat platform client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The bot's own account
    async fn current_user(&self) -> Result<User>;

    async fn guild(&self, guild_id: GuildId) -> Result<GuildInfo>;

    /// Whether the member holds a role with the administrator permission
    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool>;

    /// All channels and categories of a guild
    async fn channels(&self, guild_id: GuildId) -> Result<Vec<Channel>>;

    async fn channel(&self, channel_id: ChannelId) -> Result<Channel>;

    async fn create_channel(&self, guild_id: GuildId, request: NewChannel) -> Result<Channel>;

    async fn edit_channel_permissions(
        &self,
        channel: &Channel,
        overwrites: &[PermissionOverwrite],
    ) -> Result<()>;

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId>;

    /// React to a message as the bot
    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()>;

    /// Remove one user's reaction from a message
    async fn remove_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()>;

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()>;

    /// Acknowledge a command with a reply only the invoker can see
    async fn reply_ephemeral(&self, interaction: &Interaction, content: &str) -> Result<()>;
}
