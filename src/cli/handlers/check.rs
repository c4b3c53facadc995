//! Handler for the `check` command

use crate::cli::OutputFormatter;
use crate::config::BotConfig;
use crate::error::Result;

/// Validate the configuration and print the effective settings
///
/// The token itself is never printed, only whether one is available. A
/// missing token is reported as a warning since `run --dry-run` works
/// without one.
pub fn handle_check_command(config: &BotConfig, output: &OutputFormatter) -> Result<()> {
    config.validate()?;
    let has_token = config.token().is_ok();

    if output.is_json() {
        let mut redacted = config.clone();
        redacted.bot.token = None;
        output.json(&serde_json::json!({
            "status": "ok",
            "token_present": has_token,
            "config": redacted,
        }))?;
        return Ok(());
    }

    output.success("Configuration is valid");
    output.info("");
    output.key_value("API", &config.bot.api_base);
    output.key_value(
        "Token",
        if has_token { "present" } else { "missing" },
    );
    output.key_value("Announcement channel", &config.channels.announcement);
    output.key_value("Tickets category", &config.channels.tickets_category);
    output.key_value("Ticket channel prefix", &config.channels.ticket_prefix);
    output.key_value(
        "Markers (open / close)",
        &format!("{} / {}", config.markers.open, config.markers.close),
    );
    output.key_value(
        "Close grace period",
        &format!("{}s", config.close_grace().as_secs()),
    );
    output.key_value(
        "Prompts restricted to admins",
        &config.tickets.restrict_prompts_to_admins.to_string(),
    );

    if !has_token {
        output.warning("No bot token configured; only `run --dry-run` will work");
    }
    Ok(())
}
