//! Control-panel bridge
//!
//! An operator front-end running on its own thread submits requests through a
//! [`PanelBridge`]; a [`PanelService`] task executes them against the core and
//! reports back on a broadcast channel. Channel-list refreshes published by
//! the gateway reach the panel the same way.

mod terminal;

pub use terminal::TerminalPanel;

use crate::core::{Channel, ChannelId, GuildId, OutgoingMessage};
use crate::directory::ChannelDirectory;
use crate::error::{BotError, Result};
use crate::lifecycle::TicketLifecycle;
use crate::platform::ChatPlatform;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 100;

/// Work submitted by the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelRequest {
    SendMessage {
        id: Uuid,
        channel_id: ChannelId,
        content: String,
    },
    CreateTicket {
        id: Uuid,
        guild_id: GuildId,
        channel_id: ChannelId,
        title: String,
        description: String,
    },
    RefreshChannels {
        guild_id: GuildId,
    },
}

/// Notifications delivered to the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Current text channels of a guild
    ChannelsRefreshed {
        guild_id: GuildId,
        channels: Vec<Channel>,
    },
    /// Result of a request, `Err` carrying the failure description
    RequestCompleted {
        id: Uuid,
        outcome: std::result::Result<String, String>,
    },
}

/// Handle shared by the panel thread and the async side
#[derive(Clone)]
pub struct PanelBridge {
    requests: mpsc::UnboundedSender<PanelRequest>,
    events: broadcast::Sender<PanelEvent>,
}

impl std::fmt::Debug for PanelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelBridge")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl PanelBridge {
    /// Create a bridge and the receiving end for its [`PanelService`]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PanelRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        (Self { requests, events }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    /// Queue a plain message for `channel_id`
    pub fn send_message(&self, channel_id: ChannelId, content: impl Into<String>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.submit(PanelRequest::SendMessage {
            id,
            channel_id,
            content: content.into(),
        })?;
        Ok(id)
    }

    /// Queue a ticket prompt for `channel_id`
    pub fn create_ticket(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.submit(PanelRequest::CreateTicket {
            id,
            guild_id,
            channel_id,
            title: title.into(),
            description: description.into(),
        })?;
        Ok(id)
    }

    pub fn refresh_channels(&self, guild_id: GuildId) -> Result<()> {
        self.submit(PanelRequest::RefreshChannels { guild_id })
    }

    /// Publish the text channels of a guild to every subscriber
    pub fn notify_channels(&self, guild_id: GuildId, channels: Vec<Channel>) {
        // No subscriber just means no panel is attached
        let _ = self
            .events
            .send(PanelEvent::ChannelsRefreshed { guild_id, channels });
    }

    fn notify_completed(&self, id: Uuid, outcome: Result<String>) {
        let _ = self.events.send(PanelEvent::RequestCompleted {
            id,
            outcome: outcome.map_err(|e| e.to_string()),
        });
    }

    fn submit(&self, request: PanelRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| BotError::channel_op("panel", "control panel service is not running"))
    }
}

/// Executes panel requests on the runtime
pub struct PanelService {
    bridge: PanelBridge,
    platform: Arc<dyn ChatPlatform>,
    directory: Arc<ChannelDirectory>,
    engine: Arc<TicketLifecycle>,
}

impl PanelService {
    pub fn new(
        bridge: PanelBridge,
        platform: Arc<dyn ChatPlatform>,
        directory: Arc<ChannelDirectory>,
        engine: Arc<TicketLifecycle>,
    ) -> Self {
        Self {
            bridge,
            platform,
            directory,
            engine,
        }
    }

    /// Serve requests until every bridge is dropped
    pub async fn run(self, mut requests: mpsc::UnboundedReceiver<PanelRequest>) {
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("Control panel service stopped");
    }

    async fn handle(&self, request: PanelRequest) {
        match request {
            PanelRequest::SendMessage {
                id,
                channel_id,
                content,
            } => {
                let outcome = self
                    .platform
                    .send_message(channel_id, OutgoingMessage::text(content))
                    .await
                    .map(|message_id| format!("Message {message_id} envoyé"));
                self.complete(id, outcome);
            },
            PanelRequest::CreateTicket {
                id,
                guild_id,
                channel_id,
                title,
                description,
            } => {
                let outcome = self
                    .engine
                    .create_prompt(guild_id, channel_id, &title, &description)
                    .await
                    .map(|prompt| format!("Ticket '{}' créé", prompt.title));
                self.complete(id, outcome);
            },
            PanelRequest::RefreshChannels { guild_id } => {
                match self.directory.text_channels(guild_id).await {
                    Ok(channels) => self.bridge.notify_channels(guild_id, channels),
                    Err(e) => tracing::warn!("Channel refresh for guild {} failed: {}", guild_id, e),
                }
            },
        }
    }

    fn complete(&self, id: Uuid, outcome: Result<String>) {
        match &outcome {
            Ok(detail) => tracing::info!("Panel request {}: {}", id, detail),
            Err(e) => tracing::error!("Panel request {} failed: {}", id, e),
        }
        self.bridge.notify_completed(id, outcome);
    }
}
