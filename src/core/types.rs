//! Domain types shared across the gateway

use serde::{Deserialize, Serialize};

use crate::utils::error::{GatewayError, Result};

/// Role of a dialogue message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the dialogue history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// One logical generation request
///
/// Immutable once passed to the orchestrator. Build with
/// [`RequestContext::builder`]; unset knobs inherit gateway defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Classroom session this dialogue belongs to
    pub session_id: String,
    /// Ordered dialogue history
    pub messages: Vec<ChatMessage>,
    /// Optional topic under discussion (e.g. "promissory estoppel")
    pub topic: Option<String>,
    /// Optional case reference the dialogue is anchored to
    pub case_citation: Option<String>,
    /// Maximum allowed estimated cost for this request, USD
    pub cost_ceiling: f64,
    /// Context window granted to this request
    pub max_context_tokens: u32,
    /// When false, exhausting all providers is an error instead of a
    /// locally synthesized response
    pub allow_local_fallback: bool,
}

impl RequestContext {
    pub fn builder(session_id: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder::new(session_id)
    }
}

/// Builder for [`RequestContext`]
#[derive(Debug, Clone)]
pub struct RequestContextBuilder {
    session_id: String,
    messages: Vec<ChatMessage>,
    topic: Option<String>,
    case_citation: Option<String>,
    cost_ceiling: f64,
    max_context_tokens: u32,
    allow_local_fallback: bool,
}

impl RequestContextBuilder {
    fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            topic: None,
            case_citation: None,
            cost_ceiling: 0.50,
            max_context_tokens: 8000,
            allow_local_fallback: true,
        }
    }

    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn case_citation(mut self, citation: impl Into<String>) -> Self {
        self.case_citation = Some(citation.into());
        self
    }

    pub fn cost_ceiling(mut self, ceiling: f64) -> Self {
        self.cost_ceiling = ceiling;
        self
    }

    pub fn max_context_tokens(mut self, tokens: u32) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    /// Disable the deterministic local response when all providers fail
    pub fn without_local_fallback(mut self) -> Self {
        self.allow_local_fallback = false;
        self
    }

    pub fn build(self) -> Result<RequestContext> {
        if self.session_id.trim().is_empty() {
            return Err(GatewayError::invalid_input("session id must not be blank"));
        }
        Ok(RequestContext {
            session_id: self.session_id,
            messages: self.messages,
            topic: self.topic,
            case_citation: self.case_citation,
            cost_ceiling: self.cost_ceiling,
            max_context_tokens: self.max_context_tokens,
            allow_local_fallback: self.allow_local_fallback,
        })
    }
}

/// Token accounting for one completed call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A completed generation returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    /// Unique id for this gateway request
    pub request_id: String,
    /// Generated text
    pub content: String,
    /// Provider that produced the response ("local" for the stub)
    pub provider: String,
    /// Model that produced the response
    pub model: String,
    pub usage: TokenUsage,
    /// Cost in USD derived from actual usage
    pub cost: f64,
    pub latency_ms: u64,
    /// True when the response did not come from the primary provider
    pub fallback: bool,
    /// True when the response was synthesized locally
    pub stub: bool,
}
