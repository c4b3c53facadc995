//! Core domain types shared by every component

mod builders;
mod ids;
mod model;
pub mod naming;

pub use builders::{ChannelBuilder, EmbedBuilder};
pub use ids::{ChannelId, GuildId, MessageId, UserId};
pub use model::{
    Channel, ChannelKind, Embed, EmbedField, GuildInfo, Interaction, Member, NewChannel,
    OutgoingMessage, OverwriteTarget, PermissionOverwrite, TicketPrompt, User, colour,
};
