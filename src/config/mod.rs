//! Configuration for poster-bot
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults ([`BotConfig::default`])
//! 2. a TOML file (`--config PATH`, else `poster-bot.toml` in the working
//!    directory, else `config.toml` in the platform config directory)
//! 3. environment variables `POSTER_BOT__<SECTION>__<KEY>`
//!
//! The bot token is read from `bot.token` or, failing that, `DISCORD_TOKEN`.

use crate::error::{BotError, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the bot token
pub const TOKEN_ENV_VAR: &str = "DISCORD_TOKEN";

const ENV_PREFIX: &str = "POSTER_BOT";
const LOCAL_CONFIG_FILE: &str = "poster-bot.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot: BotSection,
    pub channels: ChannelNames,
    pub markers: Markers,
    pub tickets: TicketSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSection {
    #[serde(default)]
    pub token: Option<String>,
    /// Base URL of the platform REST API
    pub api_base: String,
}

/// Fixed names the Channel Directory resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelNames {
    pub announcement: String,
    pub announcement_topic: String,
    pub announcement_notice: String,
    pub tickets_category: String,
    /// Prefix of every ticket channel name
    pub ticket_prefix: String,
}

/// Reaction glyphs driving the ticket state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSettings {
    pub close_grace_secs: u64,
    pub prompt_footer: String,
    /// Only administrators may post ticket prompts
    pub restrict_prompts_to_admins: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot: BotSection {
                token: None,
                api_base: "https://discord.com/api/v10".to_string(),
            },
            channels: ChannelNames {
                announcement: "admin-announcements".to_string(),
                announcement_topic:
                    "Canal d'annonces officiel - Seuls les administrateurs peuvent écrire ici"
                        .to_string(),
                announcement_notice: "🔒 Ce canal est réservé aux annonces officielles. \
                                      Seuls les administrateurs peuvent y écrire."
                    .to_string(),
                tickets_category: "Tickets".to_string(),
                ticket_prefix: "ticket-".to_string(),
            },
            markers: Markers {
                open: "🎫".to_string(),
                close: "🔒".to_string(),
            },
            tickets: TicketSettings {
                close_grace_secs: 5,
                prompt_footer: "ArkeonProject - Système de tickets".to_string(),
                restrict_prompts_to_admins: false,
            },
        }
    }
}

impl BotConfig {
    /// Load configuration from defaults, file and environment
    ///
    /// An explicit `path` must exist; the implicit locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
            },
            None => {
                if let Some(found) = Self::discover_file() {
                    tracing::debug!("Using configuration file {}", found.display());
                    builder = builder.add_source(File::from(found).format(FileFormat::Toml));
                }
            },
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        if config.bot.token.as_deref().is_none_or(str::is_empty) {
            config.bot.token = std::env::var(TOKEN_ENV_VAR).ok();
        }
        Ok(config)
    }

    fn discover_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        ProjectDirs::from("org", "arkeon", "poster-bot")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|candidate| candidate.is_file())
    }

    /// The bot token, or [`BotError::ConfigurationMissing`]
    pub fn token(&self) -> Result<&str> {
        self.bot
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| BotError::ConfigurationMissing(TOKEN_ENV_VAR.to_string()))
    }

    pub const fn close_grace(&self) -> Duration {
        Duration::from_secs(self.tickets.close_grace_secs)
    }

    /// Check the settings the state machine relies on
    pub fn validate(&self) -> Result<()> {
        if self.markers.open == self.markers.close {
            return Err(BotError::Config(config::ConfigError::Message(
                "markers.open and markers.close must differ".to_string(),
            )));
        }
        if self.channels.ticket_prefix.is_empty() {
            return Err(BotError::Config(config::ConfigError::Message(
                "channels.ticket_prefix must not be empty".to_string(),
            )));
        }
        Ok(())
    }
}
