//! Interactive terminal front-end for the control panel

use super::{PanelBridge, PanelEvent};
use crate::core::{Channel, GuildId};
use crate::error::Result;
use colored::Colorize;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use std::collections::BTreeMap;
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

const ACTIONS: [&str; 4] = [
    "Envoyer un message",
    "Créer un ticket",
    "Rafraîchir les salons",
    "Quitter",
];

/// Menu-driven operator console
///
/// Blocks the calling thread; run it with `tokio::task::spawn_blocking`.
pub struct TerminalPanel {
    theme: ColorfulTheme,
    bridge: PanelBridge,
    events: broadcast::Receiver<PanelEvent>,
    channels: BTreeMap<GuildId, Vec<Channel>>,
}

impl TerminalPanel {
    pub fn new(bridge: PanelBridge) -> Self {
        let events = bridge.subscribe();
        Self {
            theme: ColorfulTheme::default(),
            bridge,
            events,
            channels: BTreeMap::new(),
        }
    }

    /// Show the menu until the operator quits
    pub fn run(mut self) -> Result<()> {
        println!("🎛️  Panneau de contrôle poster-bot\n");

        loop {
            self.absorb_events();

            let action = Select::with_theme(&self.theme)
                .with_prompt("Action")
                .items(&ACTIONS)
                .default(0)
                .interact()?;

            match action {
                0 => self.send_message()?,
                1 => self.create_ticket()?,
                2 => self.refresh()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn send_message(&mut self) -> Result<()> {
        let Some(channel) = self.pick_channel()? else {
            return Ok(());
        };
        let content: String = Input::with_theme(&self.theme)
            .with_prompt("Message")
            .interact_text()?;

        let id = self.bridge.send_message(channel.id, content)?;
        self.await_completion(id);
        Ok(())
    }

    fn create_ticket(&mut self) -> Result<()> {
        let Some(channel) = self.pick_channel()? else {
            return Ok(());
        };
        let title: String = Input::with_theme(&self.theme)
            .with_prompt("Titre")
            .interact_text()?;
        let description: String = Input::with_theme(&self.theme)
            .with_prompt("Description")
            .interact_text()?;

        let id = self
            .bridge
            .create_ticket(channel.guild_id, channel.id, title, description)?;
        self.await_completion(id);
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        for guild_id in self.channels.keys() {
            self.bridge.refresh_channels(*guild_id)?;
        }
        println!("{}", "Rafraîchissement demandé".dimmed());
        Ok(())
    }

    fn pick_channel(&mut self) -> Result<Option<Channel>> {
        self.absorb_events();
        let channels: Vec<&Channel> = self.channels.values().flatten().collect();
        if channels.is_empty() {
            println!("{}", "Aucun salon connu pour le moment".yellow());
            return Ok(None);
        }

        let labels: Vec<String> = channels
            .iter()
            .map(|channel| format!("#{} ({})", channel.name, channel.guild_id))
            .collect();
        let index = Select::with_theme(&self.theme)
            .with_prompt("Salon")
            .items(&labels)
            .default(0)
            .interact()?;
        Ok(Some(channels[index].clone()))
    }

    /// Block until the service reports on request `id`
    fn await_completion(&mut self, id: Uuid) {
        loop {
            match self.events.blocking_recv() {
                Ok(PanelEvent::RequestCompleted { id: done, outcome }) if done == id => {
                    match outcome {
                        Ok(detail) => println!("{} {}", "✓".green(), detail),
                        Err(e) => println!("{} {}", "✗".red(), e),
                    }
                    return;
                },
                Ok(event) => self.apply(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {},
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    fn absorb_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Lagged(_)) => {},
                Err(TryRecvError::Empty | TryRecvError::Closed) => return,
            }
        }
    }

    fn apply(&mut self, event: PanelEvent) {
        if let PanelEvent::ChannelsRefreshed { guild_id, channels } = event {
            self.channels.insert(guild_id, channels);
        }
    }
}
