//! Error types for poster-bot
//!
//! Every failure the core can produce is one of the variants below. Handlers
//! catch them at the boundary of a single event, so none of them terminate
//! the process except [`BotError::ConfigurationMissing`] at startup.

use thiserror::Error;

/// Result type alias for poster-bot operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Main error type for poster-bot
#[derive(Error, Debug)]
pub enum BotError {
    /// The acting member lacks the privilege required by the operation
    #[error("Unauthorized: {action} requires administrator privileges")]
    Unauthorized { action: String },

    /// The user already has an open ticket channel
    #[error("Ticket channel '{channel}' already exists")]
    AlreadyExists { channel: String },

    /// A call to the chat platform failed
    #[error("Channel operation '{operation}' failed: {reason}")]
    ChannelOperationFailed { operation: String, reason: String },

    /// A required setting is absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// No ticket prompt is registered under the given message id
    #[error("No ticket prompt registered for message {0}")]
    PromptNotFound(String),

    /// An inbound gateway event could not be decoded
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Configuration layering or deserialization failed
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),
}

impl BotError {
    /// Build a [`BotError::ChannelOperationFailed`] from any displayable cause
    pub fn channel_op(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ChannelOperationFailed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is fatal to the process
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMissing(_) | Self::Config(_))
    }

    /// Get a user-facing message, in the guild's language
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { .. } => {
                "❌ Vous devez être administrateur pour utiliser cette commande.".to_string()
            },
            Self::AlreadyExists { .. } => "Vous avez déjà un ticket ouvert!".to_string(),
            Self::PromptNotFound(_) => "❌ Ce ticket n'existe plus.".to_string(),
            other => other.to_string(),
        }
    }

    /// Get suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ConfigurationMissing(_) => vec![
                "Set DISCORD_TOKEN in your .env file or environment variables".to_string(),
                "Or set bot.token in poster-bot.toml".to_string(),
            ],
            Self::Config(_) => vec!["Run 'poster-bot check' to validate the configuration".to_string()],
            Self::InvalidEvent(_) => vec![
                "Events must be one JSON object per line with a \"type\" field".to_string(),
            ],
            _ => vec![],
        }
    }
}
