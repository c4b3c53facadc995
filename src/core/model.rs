use super::{ChannelId, GuildId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Create a human user
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            global_name: None,
            bot: false,
        }
    }

    /// Mention markup that pings the user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Name shown to other members
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }
}

/// A user seen as a member of one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    /// Whether any of the member's roles grants the administrator permission
    #[serde(default)]
    pub administrator: bool,
}

impl Member {
    pub const fn new(user: User, administrator: bool) -> Self {
        Self {
            user,
            nick: None,
            administrator,
        }
    }

    pub fn display_name(&self) -> &str {
        self.nick
            .as_deref()
            .unwrap_or_else(|| self.user.display_name())
    }
}

/// Guild metadata the core needs: its name and owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Category,
    Other,
}

/// A channel or category inside a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl Channel {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }

    pub fn is_category(&self) -> bool {
        self.kind == ChannelKind::Category
    }
}

/// Who a permission overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OverwriteTarget {
    /// The guild's default role
    Everyone,
    /// The bot's own account
    Bot,
    Member(UserId),
}

/// Channel-level permission override
///
/// `Some(true)` allows, `Some(false)` denies and `None` inherits from the
/// parent category or guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub view_channel: Option<bool>,
    pub send_messages: Option<bool>,
}

impl PermissionOverwrite {
    /// Can read, cannot write
    pub const fn read_only(target: OverwriteTarget) -> Self {
        Self {
            target,
            view_channel: Some(true),
            send_messages: Some(false),
        }
    }

    pub const fn read_write(target: OverwriteTarget) -> Self {
        Self {
            target,
            view_channel: Some(true),
            send_messages: Some(true),
        }
    }

    /// Cannot see the channel at all
    pub const fn hidden(target: OverwriteTarget) -> Self {
        Self {
            target,
            view_channel: Some(false),
            send_messages: None,
        }
    }
}

/// Request to create a channel or category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub topic: Option<String>,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Structured message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Embed accent colours
pub mod colour {
    pub const BLUE: u32 = 0x0034_98DB;
    pub const GREEN: u32 = 0x002E_CC71;
}

/// A message to post: plain text, an embed, or both
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embed: None,
        }
    }

    pub const fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embed: Some(embed),
        }
    }
}

/// A posted message inviting members to react in order to open a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPrompt {
    pub prompt_id: MessageId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A command invocation together with what is needed to answer it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub member: Member,
}
