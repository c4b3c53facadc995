//! poster-bot - Announcement and support-ticket helper for chat guilds
//!
//! This crate provides the moderation features of a guild bot:
//! - A restricted announcement channel, created on demand, that only
//!   administrators can post into
//! - Reaction-driven support tickets: members react to a prompt to get a
//!   private channel, staff react inside it to close it after a grace period
//! - A control panel for operators to post messages and prompts
//!
//! The core talks to the platform only through the
//! [`ChatPlatform`](platform::ChatPlatform) trait, implemented by a REST
//! client and by an in-memory simulator used for dry runs and tests.

// Allow missing error documentation for internal implementations
#![allow(clippy::missing_errors_doc)]
// Allow some pedantic lints that don't improve code quality
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_self)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]

//! # Concurrency
//!
//! Events are processed concurrently, one task each. Resource creation is
//! serialized per guild and resource kind, so concurrent first use of a guild
//! yields a single announcement channel, a single tickets category and at
//! most one ticket channel per member.
//!
//! # Example
//!
//! ```rust,ignore
//! use poster_bot::bot::Bot;
//! use poster_bot::config::BotConfig;
//! use poster_bot::core::User;
//! use poster_bot::platform::InMemoryPlatform;
//! use std::sync::Arc;
//!
//! let platform = Arc::new(InMemoryPlatform::permissive(User::new(1, "poster-bot")));
//! let bot = Bot::new(platform, &BotConfig::default());
//! bot.run(events).await;
//! ```

pub mod announce;
pub mod bot;
pub mod cli;
pub mod config;
pub mod core;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod panel;
pub mod platform;
pub mod registry;

#[cfg(test)]
pub mod test_utils;

pub use error::{BotError, Result};
