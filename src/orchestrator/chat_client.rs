//! The `ChatClient` external collaborator (§6).
//!
//! Concrete LLM provider adapters are out of scope for this crate — callers
//! supply their own [`ChatClient`] implementation. The orchestration core
//! never references a concrete provider.

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;

/// Role of a single chat message sent to the LLM. No tool-call correlation
/// variant — the router never needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A JSON-schema response-format constraint, forwarded to the provider when
/// supported. `None` means plain-text completion.
#[derive(Debug, Clone)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequestOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Thin trait over an LLM chat completion call.
///
/// Implementations **must** honor `options.response_format` when present:
/// the router relies on strict JSON to come back so it can parse an
/// `AgentChoice` without a retry. All implementations must be `Send + Sync`
/// so a single client can be shared across concurrent requests.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn respond(
        &self,
        messages: &[ChatMessage],
        options: ChatRequestOptions,
    ) -> Result<ChatResponse, Box<dyn Error + Send + Sync>>;
}
