use super::model::{Embed, EmbedField, NewChannel, PermissionOverwrite};
use super::{ChannelId, ChannelKind};
use chrono::{DateTime, Utc};

/// Builder for creating Embed instances
#[derive(Default)]
pub struct EmbedBuilder {
    title: Option<String>,
    description: Option<String>,
    color: Option<u32>,
    fields: Vec<EmbedField>,
    footer: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl EmbedBuilder {
    /// Create a new embed builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the accent colour
    #[must_use]
    pub const fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Add a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Set the footer text
    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Set the timestamp
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the embed
    pub fn build(self) -> Embed {
        Embed {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            color: self.color.unwrap_or_default(),
            fields: self.fields,
            footer: self.footer,
            timestamp: self.timestamp,
        }
    }
}

/// Builder for channel and category creation requests
pub struct ChannelBuilder {
    name: String,
    kind: ChannelKind,
    parent_id: Option<ChannelId>,
    topic: Option<String>,
    overwrites: Vec<PermissionOverwrite>,
}

impl ChannelBuilder {
    /// Start a text channel request
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::with_kind(name, ChannelKind::Text)
    }

    /// Start a category request
    #[must_use]
    pub fn category(name: impl Into<String>) -> Self {
        Self::with_kind(name, ChannelKind::Category)
    }

    fn with_kind(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_id: None,
            topic: None,
            overwrites: Vec::new(),
        }
    }

    /// Place the channel under a category
    #[must_use]
    pub const fn parent(mut self, parent_id: ChannelId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the topic
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add a permission overwrite
    #[must_use]
    pub fn overwrite(mut self, overwrite: PermissionOverwrite) -> Self {
        self.overwrites.push(overwrite);
        self
    }

    /// Build the request
    pub fn build(self) -> NewChannel {
        NewChannel {
            name: self.name,
            kind: self.kind,
            parent_id: self.parent_id,
            topic: self.topic,
            overwrites: self.overwrites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OverwriteTarget, colour};

    #[test]
    fn test_embed_builder() {
        let embed = EmbedBuilder::new()
            .title("🎫 Support")
            .description("Besoin d'aide ?")
            .color(colour::GREEN)
            .field("Instructions", "Réagissez avec 🎫", false)
            .footer("ArkeonProject")
            .build();

        assert_eq!(embed.title, "🎫 Support");
        assert_eq!(embed.color, colour::GREEN);
        assert_eq!(embed.fields.len(), 1);
        assert!(!embed.fields[0].inline);
        assert_eq!(embed.footer.as_deref(), Some("ArkeonProject"));
    }

    #[test]
    fn test_channel_builder() {
        let request = ChannelBuilder::text("ticket-alice")
            .parent(ChannelId::new(10))
            .overwrite(PermissionOverwrite::hidden(OverwriteTarget::Everyone))
            .overwrite(PermissionOverwrite::read_write(OverwriteTarget::Bot))
            .build();

        assert_eq!(request.kind, ChannelKind::Text);
        assert_eq!(request.parent_id, Some(ChannelId::new(10)));
        assert_eq!(request.overwrites.len(), 2);
        assert!(request.topic.is_none());
    }
}
