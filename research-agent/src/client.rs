//! Chat-completion client for the OpenAI-compatible upstream

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use research_core::{ResearchError, ResearchResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::ModelConfig;
use crate::tools::{resolve_executed_tools, ToolExecutionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Toggle for the search model's web search and image retrieval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub include_images: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_settings: Option<SearchSettings>,
}

impl ChatRequest {
    /// Single user-message request
    pub fn user(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: None,
            search_settings: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_search_settings(mut self, settings: SearchSettings) -> Self {
        self.search_settings = Some(settings);
        self
    }

    /// Text of the last message, which is the prompt for every call we make
    pub fn prompt(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Raw completion response
///
/// Kept as JSON because tool metadata arrives in several undocumented shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion(Value);

impl Completion {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Message text of the first choice
    pub fn content(&self) -> ResearchResult<String> {
        self.0
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ResearchError::parse("No response content from model"))
    }

    pub fn executed_tools(&self) -> Option<Vec<ToolExecutionRecord>> {
        resolve_executed_tools(&self.0)
    }
}

/// A chat-completion backend
///
/// Injected into the pipeline so tests can substitute a scripted model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> ResearchResult<Completion>;
}

/// HTTP client for Groq's OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GroqClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ResearchError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    async fn send_once(&self, request: &ChatRequest) -> ResearchResult<Completion> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResearchError::timeout(format!("Chat completion timed out: {}", e))
                } else {
                    ResearchError::network(format!("Chat completion request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::http(status.as_u16(), body));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ResearchError::parse(format!("Failed to parse completion: {}", e)))?;

        Ok(Completion::new(raw))
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: ChatRequest) -> ResearchResult<Completion> {
        let mut attempt = 0;
        let mut delay = self.retry_delay;

        loop {
            match self.send_once(&request).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Chat completion failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
