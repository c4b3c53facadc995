//! Discord REST v10 client
//!
//! Only the handful of endpoints the bot needs. Gateway connectivity lives
//! outside the crate; events reach us through the relay feed.

use super::ChatPlatform;
use crate::core::{
    Channel, ChannelId, ChannelKind, Embed, EmbedField, GuildId, GuildInfo, Interaction,
    MessageId, NewChannel, OutgoingMessage, OverwriteTarget, PermissionOverwrite, User, UserId,
};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;

const ADMINISTRATOR: u64 = 1 << 3;
const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

const OVERWRITE_TYPE_ROLE: u8 = 0;
const OVERWRITE_TYPE_MEMBER: u8 = 1;

const INTERACTION_CHANNEL_MESSAGE: u8 = 4;
const MESSAGE_FLAG_EPHEMERAL: u64 = 1 << 6;

/// Chat platform backed by the Discord REST API
pub struct DiscordRest {
    client: reqwest::Client,
    base_url: String,
    token: String,
    me: OnceCell<User>,
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: UserId,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        Self {
            id: wire.id,
            name: wire.username,
            global_name: wire.global_name,
            bot: wire.bot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRole {
    id: String,
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: GuildId,
    name: String,
    owner_id: UserId,
    #[serde(default)]
    roles: Vec<WireRole>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: ChannelId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    guild_id: Option<GuildId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<ChannelId>,
    #[serde(default)]
    topic: Option<String>,
}

impl WireChannel {
    fn into_channel(self, fallback_guild: GuildId) -> Channel {
        let kind = match self.kind {
            CHANNEL_TYPE_TEXT => ChannelKind::Text,
            CHANNEL_TYPE_CATEGORY => ChannelKind::Category,
            _ => ChannelKind::Other,
        };
        Channel {
            id: self.id,
            guild_id: self.guild_id.unwrap_or(fallback_guild),
            name: self.name.unwrap_or_default(),
            kind,
            parent_id: self.parent_id,
            topic: self.topic,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct WireOverwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    allow: String,
    deny: String,
}

#[derive(Debug, Serialize)]
struct WireFooter {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<WireFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl From<Embed> for WireEmbed {
    fn from(embed: Embed) -> Self {
        Self {
            title: embed.title,
            description: embed.description,
            color: embed.color,
            fields: embed.fields,
            footer: embed.footer.map(|text| WireFooter { text }),
            timestamp: embed.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<WireEmbed>,
}

#[derive(Debug, Serialize)]
struct WireCreateChannel {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<ChannelId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    permission_overwrites: Vec<WireOverwrite>,
}

/// Encode an overwrite as `(allow, deny)` permission bitsets
fn permission_bits(overwrite: &PermissionOverwrite) -> (u64, u64) {
    let mut allow = 0;
    let mut deny = 0;
    for (setting, bit) in [
        (overwrite.view_channel, VIEW_CHANNEL),
        (overwrite.send_messages, SEND_MESSAGES),
    ] {
        match setting {
            Some(true) => allow |= bit,
            Some(false) => deny |= bit,
            None => {},
        }
    }
    (allow, deny)
}

fn encode_overwrite(
    overwrite: &PermissionOverwrite,
    guild_id: GuildId,
    bot_id: UserId,
) -> WireOverwrite {
    let (id, kind) = match overwrite.target {
        // The @everyone role shares the guild's id
        OverwriteTarget::Everyone => (guild_id.to_string(), OVERWRITE_TYPE_ROLE),
        OverwriteTarget::Bot => (bot_id.to_string(), OVERWRITE_TYPE_MEMBER),
        OverwriteTarget::Member(user_id) => (user_id.to_string(), OVERWRITE_TYPE_MEMBER),
    };
    let (allow, deny) = permission_bits(overwrite);
    WireOverwrite {
        id,
        kind,
        allow: allow.to_string(),
        deny: deny.to_string(),
    }
}

/// Whether the @everyone role or any of `member_roles` grants administrator
fn grants_administrator(guild: &WireGuild, member_roles: &[String]) -> bool {
    let everyone = guild.id.to_string();
    guild
        .roles
        .iter()
        .filter(|role| role.id == everyone || member_roles.contains(&role.id))
        .filter_map(|role| role.permissions.parse::<u64>().ok())
        .any(|permissions| permissions & ADMINISTRATOR != 0)
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|e| BotError::channel_op("endpoint", e))?;
    url.path_segments_mut()
        .map_err(|()| BotError::channel_op("endpoint", format!("invalid base URL {base_url}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl DiscordRest {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            me: OnceCell::new(),
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        Ok(self
            .client
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.token)))
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BotError::channel_op(operation, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(BotError::channel_op(
                operation,
                format!("rate limited, retry after {retry_after}s"),
            ));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BotError::channel_op(
                operation,
                format!("{status}: {error_text}"),
            ));
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        self.execute(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BotError::channel_op(operation, e))
    }

    async fn bot_id(&self) -> Result<UserId> {
        Ok(self.current_user().await?.id)
    }

    async fn wire_guild(&self, guild_id: GuildId) -> Result<WireGuild> {
        let guild = guild_id.to_string();
        self.fetch("guild", self.request(Method::GET, &["guilds", &guild])?)
            .await
    }
}

#[async_trait]
impl ChatPlatform for DiscordRest {
    async fn current_user(&self) -> Result<User> {
        self.me
            .get_or_try_init(|| async {
                let wire: WireUser = self
                    .fetch("current_user", self.request(Method::GET, &["users", "@me"])?)
                    .await?;
                Ok::<_, BotError>(User::from(wire))
            })
            .await
            .cloned()
    }

    async fn guild(&self, guild_id: GuildId) -> Result<GuildInfo> {
        let wire = self.wire_guild(guild_id).await?;
        Ok(GuildInfo {
            id: wire.id,
            name: wire.name,
            owner_id: wire.owner_id,
        })
    }

    async fn is_administrator(&self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        let guild = self.wire_guild(guild_id).await?;
        let (guild_segment, user_segment) = (guild_id.to_string(), user_id.to_string());
        let member: WireMember = self
            .fetch(
                "guild_member",
                self.request(
                    Method::GET,
                    &["guilds", &guild_segment, "members", &user_segment],
                )?,
            )
            .await?;
        Ok(grants_administrator(&guild, &member.roles))
    }

    async fn channels(&self, guild_id: GuildId) -> Result<Vec<Channel>> {
        let guild = guild_id.to_string();
        let wire: Vec<WireChannel> = self
            .fetch(
                "channels",
                self.request(Method::GET, &["guilds", &guild, "channels"])?,
            )
            .await?;
        Ok(wire
            .into_iter()
            .map(|channel| channel.into_channel(guild_id))
            .collect())
    }

    async fn channel(&self, channel_id: ChannelId) -> Result<Channel> {
        let id = channel_id.to_string();
        let wire: WireChannel = self
            .fetch("channel", self.request(Method::GET, &["channels", &id])?)
            .await?;
        let guild_id = wire
            .guild_id
            .ok_or_else(|| BotError::channel_op("channel", format!("{channel_id} is not a guild channel")))?;
        Ok(wire.into_channel(guild_id))
    }

    async fn create_channel(&self, guild_id: GuildId, request: NewChannel) -> Result<Channel> {
        let bot_id = self.bot_id().await?;
        let body = WireCreateChannel {
            name: request.name,
            kind: match request.kind {
                ChannelKind::Category => CHANNEL_TYPE_CATEGORY,
                ChannelKind::Text | ChannelKind::Other => CHANNEL_TYPE_TEXT,
            },
            parent_id: request.parent_id,
            topic: request.topic,
            permission_overwrites: request
                .overwrites
                .iter()
                .map(|overwrite| encode_overwrite(overwrite, guild_id, bot_id))
                .collect(),
        };
        let guild = guild_id.to_string();
        let wire: WireChannel = self
            .fetch(
                "create_channel",
                self.request(Method::POST, &["guilds", &guild, "channels"])?
                    .json(&body),
            )
            .await?;
        Ok(wire.into_channel(guild_id))
    }

    async fn edit_channel_permissions(
        &self,
        channel: &Channel,
        overwrites: &[PermissionOverwrite],
    ) -> Result<()> {
        let bot_id = self.bot_id().await?;
        let channel_segment = channel.id.to_string();
        for overwrite in overwrites {
            let wire = encode_overwrite(overwrite, channel.guild_id, bot_id);
            let body = json!({ "allow": wire.allow, "deny": wire.deny, "type": wire.kind });
            self.execute(
                "edit_channel_permissions",
                self.request(
                    Method::PUT,
                    &["channels", &channel_segment, "permissions", &wire.id],
                )?
                .json(&body),
            )
            .await?;
        }
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId> {
        let body = WireMessageBody {
            content: message.content,
            embeds: message.embed.map(WireEmbed::from).into_iter().collect(),
        };
        let channel = channel_id.to_string();
        let wire: WireMessage = self
            .fetch(
                "send_message",
                self.request(Method::POST, &["channels", &channel, "messages"])?
                    .json(&body),
            )
            .await?;
        Ok(wire.id)
    }

    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()> {
        let (channel, message) = (channel_id.to_string(), message_id.to_string());
        self.execute(
            "add_reaction",
            self.request(
                Method::PUT,
                &["channels", &channel, "messages", &message, "reactions", emoji, "@me"],
            )?,
        )
        .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()> {
        let (channel, message, user) = (
            channel_id.to_string(),
            message_id.to_string(),
            user_id.to_string(),
        );
        self.execute(
            "remove_reaction",
            self.request(
                Method::DELETE,
                &["channels", &channel, "messages", &message, "reactions", emoji, &user],
            )?,
        )
        .await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        let channel = channel_id.to_string();
        self.execute(
            "delete_channel",
            self.request(Method::DELETE, &["channels", &channel])?,
        )
        .await?;
        Ok(())
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()> {
        let dm: WireChannel = self
            .fetch(
                "open_direct_message",
                self.request(Method::POST, &["users", "@me", "channels"])?
                    .json(&json!({ "recipient_id": user_id.to_string() })),
            )
            .await?;
        let channel = dm.id.to_string();
        self.execute(
            "send_direct_message",
            self.request(Method::POST, &["channels", &channel, "messages"])?
                .json(&json!({ "content": content })),
        )
        .await?;
        Ok(())
    }

    async fn reply_ephemeral(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let body = json!({
            "type": INTERACTION_CHANNEL_MESSAGE,
            "data": { "content": content, "flags": MESSAGE_FLAG_EPHEMERAL },
        });
        self.execute(
            "reply_ephemeral",
            self.request(
                Method::POST,
                &["interactions", &interaction.id, &interaction.token, "callback"],
            )?
            .json(&body),
        )
        .await?;
        Ok(())
    }
}
