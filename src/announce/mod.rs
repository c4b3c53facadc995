//! Announcement Publisher

use crate::core::{EmbedBuilder, GuildId, Member, MessageId, OutgoingMessage, colour};
use crate::directory::ChannelDirectory;
use crate::error::{BotError, Result};
use crate::platform::ChatPlatform;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Posts administrator announcements into the guild's broadcast channel
pub struct AnnouncementPublisher {
    platform: Arc<dyn ChatPlatform>,
    directory: Arc<ChannelDirectory>,
}

impl AnnouncementPublisher {
    pub fn new(platform: Arc<dyn ChatPlatform>, directory: Arc<ChannelDirectory>) -> Self {
        Self {
            platform,
            directory,
        }
    }

    /// Whether `member` may use administrator commands: an administrator
    /// role or ownership of the guild
    pub async fn is_privileged(&self, guild_id: GuildId, member: &Member) -> Result<bool> {
        if member.administrator {
            return Ok(true);
        }
        Ok(self.platform.guild(guild_id).await?.owner_id == member.user.id)
    }

    /// Publish an announcement authored by `author`
    ///
    /// Members who are neither administrator nor guild owner get
    /// [`BotError::Unauthorized`] and nothing is posted. Every successful
    /// call posts a new message.
    pub async fn publish(
        &self,
        guild_id: GuildId,
        author: &Member,
        title: &str,
        content: &str,
    ) -> Result<MessageId> {
        if !self.is_privileged(guild_id, author).await? {
            warn!(
                "Rejected announcement from non-administrator {} in guild {}",
                author.user.id, guild_id
            );
            return Err(BotError::Unauthorized {
                action: "announce".to_string(),
            });
        }

        let channel = self
            .directory
            .get_or_create_announcement_channel(guild_id)
            .await?;

        let embed = EmbedBuilder::new()
            .title(title)
            .description(content)
            .color(colour::BLUE)
            .footer(format!("Annonce par {}", author.user.name))
            .timestamp(Utc::now())
            .build();
        let message_id = self
            .platform
            .send_message(channel.id, OutgoingMessage::embed(embed))
            .await?;

        info!(
            "Announcement '{}' by {} posted in #{}",
            title, author.user.name, channel.name
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockChatPlatform;
    use crate::core::GuildInfo;
    use crate::test_utils::{ADMIN, GUILD, MEMBER, OWNER, TestGuild};

    #[tokio::test]
    async fn test_admin_announcement_is_posted_with_author() {
        let guild = TestGuild::new();
        let author = guild.member(ADMIN);

        let message_id = guild
            .publisher
            .publish(GUILD, &author, "T", "C")
            .await
            .unwrap();

        let channel = &guild.platform.channels_named(GUILD, "admin-announcements")[0];
        let posted = guild.platform.messages_in(channel.id);
        // One-time notice, then the announcement
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[1].id, message_id);
        let embed = posted[1].message.embed.as_ref().unwrap();
        assert_eq!(embed.title, "T");
        assert_eq!(embed.description, "C");
        assert_eq!(embed.footer.as_deref(), Some("Annonce par admin"));
    }

    #[tokio::test]
    async fn test_repeated_announcements_are_not_deduplicated() {
        let guild = TestGuild::new();
        let author = guild.member(ADMIN);

        guild.publisher.publish(GUILD, &author, "T", "C").await.unwrap();
        guild.publisher.publish(GUILD, &author, "T", "C").await.unwrap();

        let channels = guild.platform.channels_named(GUILD, "admin-announcements");
        assert_eq!(channels.len(), 1);
        assert_eq!(guild.platform.messages_in(channels[0].id).len(), 3);
    }

    #[tokio::test]
    async fn test_non_admin_is_rejected_without_side_effects() {
        // Only the ownership lookup is expected
        let mut platform = MockChatPlatform::new();
        platform.expect_guild().times(1).returning(|guild_id| {
            Ok(GuildInfo {
                id: guild_id,
                name: "Arkeon".to_string(),
                owner_id: OWNER,
            })
        });
        let platform: Arc<dyn ChatPlatform> = Arc::new(platform);
        let directory = Arc::new(ChannelDirectory::new(
            Arc::clone(&platform),
            crate::config::BotConfig::default().channels,
        ));
        let publisher = AnnouncementPublisher::new(platform, directory);
        let guild = TestGuild::new();

        let result = publisher
            .publish(GUILD, &guild.member(MEMBER), "T", "C")
            .await;

        assert!(matches!(result, Err(BotError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_owner_without_admin_role_may_announce() {
        let guild = TestGuild::new();
        let owner = Member::new(guild.user(OWNER), false);

        let result = guild.publisher.publish(GUILD, &owner, "T", "C").await;

        assert!(result.is_ok());
        let channel = &guild.platform.channels_named(GUILD, "admin-announcements")[0];
        let embed = guild.platform.messages_in(channel.id)[1].message.embed.clone().unwrap();
        assert_eq!(embed.footer.as_deref(), Some("Annonce par owner"));
    }
}
