//! OpenAI-compatible `/chat/completions` client.

use crate::{ChatError, ChatMessage, ChatModel, ChatRequest, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpChatConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Transport-level timeout; callers normally enforce a shorter deadline.
    pub timeout_ms: u64,
}

pub struct HttpChatModel {
    config: HttpChatConfig,
    client: reqwest::blocking::Client,
}

impl HttpChatModel {
    pub fn new(config: HttpChatConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ChatError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client })
    }
}

impl ChatModel for HttpChatModel {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        #[derive(Serialize)]
        struct Body<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChatMessage,
        }
        #[derive(Deserialize)]
        struct Completion {
            choices: Vec<Choice>,
        }

        let body = Body {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
        };
        let mut req = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let start = std::time::Instant::now();
        let resp = req.send().map_err(|e| ChatError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        let completion: Completion = resp.json().map_err(|e| ChatError::Request(e.to_string()))?;
        debug!(
            "completion from {} in {}ms",
            self.config.model,
            start.elapsed().as_millis()
        );
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ChatError::EmptyCompletion)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
