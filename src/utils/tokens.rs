//! Token budget estimation
//!
//! Computes how many input tokens a dialogue history will consume against a
//! provider's context window and how much output budget remains. Counting is
//! approximate (character-based with per-model ratios) and the estimator
//! never fails: an unrecognized model degrades to a coarse default profile
//! and the estimate is flagged as non-optimal.

use std::collections::HashMap;

use crate::config::ProviderConfig;
use crate::core::types::RequestContext;

/// Minimum output allowance granted to any call
pub const MIN_OUTPUT_TOKENS: u32 = 100;
/// Default ceiling on the output allowance
pub const MAX_OUTPUT_TOKENS: u32 = 1000;
/// Remaining-budget floor below which the estimate is flagged non-optimal
const TIGHT_BUDGET_FLOOR: u32 = 256;

/// Token estimate for one request against one provider
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenEstimate {
    /// Estimated input tokens for the serialized history
    pub input_tokens: u32,
    /// Output allowance for this call
    pub output_tokens: u32,
    /// False when the history sits too close to the context window
    pub optimal: bool,
    /// Human-readable remediation when non-optimal
    pub suggestion: Option<String>,
}

/// Per-model counting profile
#[derive(Debug, Clone, Copy)]
struct ModelTokenProfile {
    /// Average characters per token for this model family
    chars_per_token: f64,
    /// Fixed overhead per message (role markers, separators)
    message_overhead: u32,
    /// Fixed overhead per request (priming tokens)
    request_overhead: u32,
}

const FALLBACK_PROFILE: ModelTokenProfile = ModelTokenProfile {
    chars_per_token: 4.0,
    message_overhead: 4,
    request_overhead: 3,
};

/// Estimates token budgets for requests against a provider context window
#[derive(Debug, Clone)]
pub struct TokenBudgetEstimator {
    reserve_tokens: u32,
    profiles: HashMap<&'static str, ModelTokenProfile>,
}

impl TokenBudgetEstimator {
    pub fn new(reserve_tokens: u32) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "gpt-4",
            ModelTokenProfile {
                chars_per_token: 4.0,
                message_overhead: 3,
                request_overhead: 3,
            },
        );
        profiles.insert(
            "gpt-3.5",
            ModelTokenProfile {
                chars_per_token: 4.0,
                message_overhead: 4,
                request_overhead: 3,
            },
        );
        profiles.insert(
            "claude",
            ModelTokenProfile {
                chars_per_token: 3.5,
                message_overhead: 5,
                request_overhead: 10,
            },
        );
        profiles.insert(
            "gemini",
            ModelTokenProfile {
                chars_per_token: 4.0,
                message_overhead: 4,
                request_overhead: 5,
            },
        );
        Self {
            reserve_tokens,
            profiles,
        }
    }

    /// Estimate the token budget for `context` against `provider`
    ///
    /// Output budget is `max_context_tokens - input - reserve`, clamped to
    /// `[MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS]`. Never fails.
    pub fn estimate(&self, context: &RequestContext, provider: &ProviderConfig) -> TokenEstimate {
        let (profile, known_model) = self.profile_for(&provider.model);

        let mut input_tokens = profile.request_overhead;
        for message in &context.messages {
            input_tokens += profile.message_overhead
                + Self::text_tokens(&message.content, profile.chars_per_token)
                + Self::text_tokens(message.role.as_str(), profile.chars_per_token);
        }

        let window = context.max_context_tokens;
        let remaining = window
            .saturating_sub(input_tokens)
            .saturating_sub(self.reserve_tokens);
        let output_tokens = remaining.clamp(MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS);

        let tight = remaining < TIGHT_BUDGET_FLOOR;
        let optimal = known_model && !tight;
        let suggestion = if tight {
            Some(format!(
                "history consumes {input_tokens} of {window} context tokens; \
                 shorten or summarize earlier turns to free output budget"
            ))
        } else if !known_model {
            Some(format!(
                "no token profile for model '{}'; using a coarse approximation",
                provider.model
            ))
        } else {
            None
        };

        TokenEstimate {
            input_tokens,
            output_tokens,
            optimal,
            suggestion,
        }
    }

    fn profile_for(&self, model: &str) -> (ModelTokenProfile, bool) {
        let model_lower = model.to_lowercase();
        for (pattern, profile) in &self.profiles {
            if model_lower.contains(pattern) {
                return (*profile, true);
            }
        }
        (FALLBACK_PROFILE, false)
    }

    fn text_tokens(text: &str, chars_per_token: f64) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        // Small buffer for encoding overhead and special tokens
        ((chars / chars_per_token) * 1.1).ceil() as u32
    }
}
