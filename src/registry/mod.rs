//! Ticket Registry
//!
//! Maps prompt message ids to the ticket metadata posted with them. Written
//! only by the prompt-creation path, read by every reaction handler.
//!
//! Prompts are never evicted and are lost on restart.

use crate::core::{MessageId, TicketPrompt};
use crate::error::{BotError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct TicketRegistry {
    prompts: RwLock<HashMap<MessageId, TicketPrompt>>,
}

impl TicketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a prompt; a prompt id is registered at most once
    pub async fn register(&self, prompt: TicketPrompt) {
        let mut prompts = self.prompts.write().await;
        if prompts.contains_key(&prompt.prompt_id) {
            tracing::warn!("Prompt {} is already registered", prompt.prompt_id);
            return;
        }
        tracing::debug!("Registered ticket prompt {} '{}'", prompt.prompt_id, prompt.title);
        prompts.insert(prompt.prompt_id, prompt);
    }

    pub async fn lookup(&self, prompt_id: MessageId) -> Result<TicketPrompt> {
        self.prompts
            .read()
            .await
            .get(&prompt_id)
            .cloned()
            .ok_or_else(|| BotError::PromptNotFound(prompt_id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.prompts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.prompts.read().await.is_empty()
    }
}
