//! Wiring of the core services around one platform connection

use crate::announce::AnnouncementPublisher;
use crate::config::BotConfig;
use crate::directory::ChannelDirectory;
use crate::gateway::{CommandHandler, EventDispatcher, GatewayEvent};
use crate::lifecycle::TicketLifecycle;
use crate::panel::{PanelBridge, PanelRequest, PanelService};
use crate::platform::ChatPlatform;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The assembled bot
pub struct Bot {
    pub platform: Arc<dyn ChatPlatform>,
    pub directory: Arc<ChannelDirectory>,
    pub engine: Arc<TicketLifecycle>,
    pub publisher: Arc<AnnouncementPublisher>,
    pub dispatcher: EventDispatcher,
    panel: PanelBridge,
    panel_requests: Option<mpsc::UnboundedReceiver<PanelRequest>>,
}

impl Bot {
    pub fn new(platform: Arc<dyn ChatPlatform>, config: &BotConfig) -> Self {
        let directory = Arc::new(ChannelDirectory::new(
            Arc::clone(&platform),
            config.channels.clone(),
        ));
        let engine = Arc::new(TicketLifecycle::new(
            Arc::clone(&platform),
            Arc::clone(&directory),
            config.markers.clone(),
            config.tickets.clone(),
        ));
        let publisher = Arc::new(AnnouncementPublisher::new(
            Arc::clone(&platform),
            Arc::clone(&directory),
        ));
        let commands = Arc::new(CommandHandler::new(
            Arc::clone(&platform),
            Arc::clone(&engine),
            Arc::clone(&publisher),
        ));
        let (panel, panel_requests) = PanelBridge::new();
        let dispatcher = EventDispatcher::new(Arc::clone(&directory), Arc::clone(&engine), commands)
            .with_panel(panel.clone());

        Self {
            platform,
            directory,
            engine,
            publisher,
            dispatcher,
            panel,
            panel_requests: Some(panel_requests),
        }
    }

    /// Handle for control-panel front-ends
    pub fn panel(&self) -> PanelBridge {
        self.panel.clone()
    }

    /// Start executing panel requests; only the first call spawns a task
    pub fn start_panel_service(&mut self) -> Option<JoinHandle<()>> {
        let requests = self.panel_requests.take()?;
        let service = PanelService::new(
            self.panel.clone(),
            Arc::clone(&self.platform),
            Arc::clone(&self.directory),
            Arc::clone(&self.engine),
        );
        Some(tokio::spawn(service.run(requests)))
    }

    /// Dispatch `events` until the feed ends, then let scheduled ticket
    /// deletions finish
    pub async fn run(mut self, events: mpsc::Receiver<GatewayEvent>) {
        let panel_service = self.start_panel_service();

        self.dispatcher.run(events).await;
        self.engine.shutdown().await;

        if let Some(handle) = panel_service {
            handle.abort();
        }
        tracing::info!("Bot stopped");
    }
}
