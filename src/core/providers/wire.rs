//! OpenAI-compatible wire format
//!
//! Response bodies are schema-validated here: a body that deserializes but
//! carries no usable choice is rejected as malformed rather than propagated
//! partially parsed.

use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::core::types::{ChatMessage, RequestContext};

/// Request body for `POST /chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatCompletionRequest {
    pub fn from_context(
        context: &RequestContext,
        model: &str,
        temperature: f32,
        max_tokens: u32,
        stream: bool,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: context.messages.iter().map(WireMessage::from).collect(),
            temperature,
            max_tokens,
            stream,
        }
    }
}

/// One message in provider wire form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Non-streaming response body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChoice {
    pub message: WireResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireResponseMessage {
    pub content: String,
}

/// Token usage as reported by the provider
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatCompletionResponse {
    /// Content of the first choice, or a malformed-response rejection
    pub fn primary_content(&self) -> Result<&str, ProviderError> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| ProviderError::malformed("response carried no choices"))
    }
}

/// One frame of a streaming response body
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}
