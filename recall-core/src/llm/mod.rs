//! Model provider seam
//!
//! The turn pipeline talks to a model only through [`LLMProvider`]. Two
//! providers ship with the crate: [`StubLLMProvider`], which refuses every
//! request, and [`ScriptedLLMProvider`], which replays canned replies and
//! records what it was asked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::conversation::Message;
use crate::error::{RecallError, Result};

/// Request to an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LLMRequest {
    /// Target model id
    pub model: String,

    /// Prompt messages, oldest first
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,
}

/// Trait for LLM provider implementations.
///
/// Implementors handle the actual model call (Groq, OpenAI, a local server).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Produce a reply to the request's messages
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse>;
}

/// Provider that is not wired to any model (returns error).
pub struct StubLLMProvider;

#[async_trait]
impl LLMProvider for StubLLMProvider {
    async fn generate(&self, _request: &LLMRequest) -> Result<LLMResponse> {
        Err(RecallError::Llm(
            "LLM provider not configured. Implement the LLMProvider trait for your model"
                .to_string(),
        ))
    }
}

/// Provider that replays canned replies in order.
///
/// Every request is recorded. Once the script runs out, requests fail.
#[derive(Default)]
pub struct ScriptedLLMProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedLLMProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().await.clone()
    }

    /// Replies not yet handed out
    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLMProvider {
    async fn generate(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.requests.lock().await.push(request.clone());

        let content = self
            .replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| RecallError::Llm("scripted provider has no replies left".to_string()))?;

        Ok(LLMResponse { content })
    }
}
