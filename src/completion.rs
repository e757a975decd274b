//! Text-completion client bound to one model.
//!
//! Every pipeline stage talks to the language model through
//! [`CompletionClient::complete`]: a system instruction plus the conversation
//! so far in, the reply text out.

use std::sync::Arc;

use uuid::Uuid;

use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, Message, ProviderError};

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

#[derive(Clone)]
pub struct CompletionClient {
    gateway: Arc<dyn ChatGateway>,
    model: ChatModel,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl CompletionClient {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: ChatModel) -> Self {
        Self {
            gateway,
            model,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn model(&self) -> &ChatModel {
        &self.model
    }

    /// Send `system` followed by `history` and return the reply content.
    pub async fn complete(
        &self,
        system: &str,
        history: &[Message],
        caller: &'static str,
        run_id: Option<Uuid>,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system));
        messages.extend(history.iter().cloned());

        let attribution = match run_id {
            Some(id) => Attribution::new(caller).with_run(id),
            None => Attribution::new(caller),
        };

        let mut req = ChatRequest::new(self.model.clone(), messages, attribution)
            .temperature(self.temperature);
        if let Some(max) = self.max_tokens {
            req = req.max_tokens(max);
        }

        let resp = self.gateway.chat(req).await?;
        Ok(resp.content)
    }
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
