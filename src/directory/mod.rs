//! Channel Directory
//!
//! Resolves or creates the well-known channels of a guild. This is the only
//! component that creates or deletes channels. Lookup-then-create sequences
//! run under a lock scoped to one guild and one resource, so concurrent
//! first uses never produce duplicates.

use crate::config::ChannelNames;
use crate::core::naming::ticket_channel_name;
use crate::core::{
    Channel, ChannelBuilder, ChannelId, GuildId, OutgoingMessage, OverwriteTarget,
    PermissionOverwrite, User,
};
use crate::error::Result;
use crate::platform::ChatPlatform;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Resources whose creation is serialized per guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Resource {
    Announcement,
    TicketsCategory,
    TicketChannels,
}

/// Result of asking for a user's ticket channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketChannelOutcome {
    Created(Channel),
    /// The user already has a ticket channel; nothing was created
    AlreadyExists(Channel),
}

pub struct ChannelDirectory {
    platform: Arc<dyn ChatPlatform>,
    names: ChannelNames,
    locks: Mutex<HashMap<(GuildId, Resource), Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for ChannelDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDirectory")
            .field("platform", &"Arc<dyn ChatPlatform>")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ChannelDirectory {
    pub fn new(platform: Arc<dyn ChatPlatform>, names: ChannelNames) -> Self {
        Self {
            platform,
            names,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub const fn names(&self) -> &ChannelNames {
        &self.names
    }

    fn creation_lock(&self, guild_id: GuildId, resource: Resource) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry((guild_id, resource)).or_default())
    }

    /// Whether a channel name follows the ticket naming convention
    pub fn is_ticket_channel(&self, channel: &Channel) -> bool {
        channel.is_text() && channel.name.starts_with(&self.names.ticket_prefix)
    }

    /// Find the announcement channel, creating it on first use
    ///
    /// A new channel is read-only for everyone and writable by the bot; a
    /// one-time notice is posted into it.
    pub async fn get_or_create_announcement_channel(&self, guild_id: GuildId) -> Result<Channel> {
        let lock = self.creation_lock(guild_id, Resource::Announcement);
        let _guard = lock.lock().await;

        if let Some(existing) = self
            .platform
            .channels(guild_id)
            .await?
            .into_iter()
            .find(|channel| channel.is_text() && channel.name == self.names.announcement)
        {
            debug!("Announcement channel {} already exists", existing.id);
            return Ok(existing);
        }

        let request = ChannelBuilder::text(&self.names.announcement)
            .topic(&self.names.announcement_topic)
            .overwrite(PermissionOverwrite::read_only(OverwriteTarget::Everyone))
            .overwrite(PermissionOverwrite::read_write(OverwriteTarget::Bot))
            .build();
        let channel = self.platform.create_channel(guild_id, request).await?;
        info!(
            "Created announcement channel #{} ({}) in guild {}",
            channel.name, channel.id, guild_id
        );

        self.platform
            .send_message(
                channel.id,
                OutgoingMessage::text(&self.names.announcement_notice),
            )
            .await?;

        Ok(channel)
    }

    /// Find the tickets category, creating it on first use
    ///
    /// The category is hidden from everyone except the bot.
    pub async fn get_or_create_tickets_category(&self, guild_id: GuildId) -> Result<Channel> {
        let lock = self.creation_lock(guild_id, Resource::TicketsCategory);
        let _guard = lock.lock().await;

        if let Some(existing) = self
            .platform
            .channels(guild_id)
            .await?
            .into_iter()
            .find(|channel| channel.is_category() && channel.name == self.names.tickets_category)
        {
            return Ok(existing);
        }

        let category = self
            .platform
            .create_channel(
                guild_id,
                ChannelBuilder::category(&self.names.tickets_category).build(),
            )
            .await?;
        self.platform
            .edit_channel_permissions(
                &category,
                &[
                    PermissionOverwrite::hidden(OverwriteTarget::Everyone),
                    PermissionOverwrite::read_write(OverwriteTarget::Bot),
                ],
            )
            .await?;
        info!(
            "Created tickets category {} ({}) in guild {}",
            category.name, category.id, guild_id
        );

        Ok(category)
    }

    /// Create `user`'s ticket channel under `category` unless one exists
    ///
    /// Only direct children of the category are inspected.
    pub async fn get_or_create_ticket_channel(
        &self,
        guild_id: GuildId,
        category: &Channel,
        user: &User,
    ) -> Result<TicketChannelOutcome> {
        let name = ticket_channel_name(&self.names.ticket_prefix, user);
        let lock = self.creation_lock(guild_id, Resource::TicketChannels);
        let _guard = lock.lock().await;

        if let Some(existing) = self
            .platform
            .channels(guild_id)
            .await?
            .into_iter()
            .find(|channel| channel.parent_id == Some(category.id) && channel.name == name)
        {
            debug!("User {} already has ticket channel {}", user.id, existing.id);
            return Ok(TicketChannelOutcome::AlreadyExists(existing));
        }

        let request = ChannelBuilder::text(name)
            .parent(category.id)
            .overwrite(PermissionOverwrite::hidden(OverwriteTarget::Everyone))
            .overwrite(PermissionOverwrite::read_write(OverwriteTarget::Member(user.id)))
            .overwrite(PermissionOverwrite::read_write(OverwriteTarget::Bot))
            .build();
        let channel = self.platform.create_channel(guild_id, request).await?;
        info!(
            "Created ticket channel #{} ({}) for user {}",
            channel.name, channel.id, user.id
        );

        Ok(TicketChannelOutcome::Created(channel))
    }

    /// Text channels of a guild, in platform order
    pub async fn text_channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        Ok(self
            .platform
            .channels(guild_id)
            .await?
            .into_iter()
            .filter(Channel::is_text)
            .collect())
    }

    /// Delete a channel; failures are logged and swallowed
    pub async fn delete_channel(&self, channel_id: ChannelId) -> bool {
        match self.platform.delete_channel(channel_id).await {
            Ok(()) => {
                info!("Deleted channel {}", channel_id);
                true
            },
            Err(e) => {
                warn!("Failed to delete channel {}: {}", channel_id, e);
                false
            },
        }
    }
}
