//! Deterministic rule-based fallback responses
//!
//! When every remote provider is exhausted the classroom still needs a
//! usable Socratic prompt. Responses come from a small fixed pool; the pick
//! is a hash of the session, history length, and topic, so repeated calls
//! for the same dialogue state return the same text and no two stages of a
//! dialogue see the same canned question twice in a row.

use std::hash::{Hash, Hasher};

use crate::core::types::RequestContext;

/// Provider id recorded for locally synthesized responses
pub const STUB_PROVIDER_ID: &str = "local";
/// Model name reported for locally synthesized responses
pub const STUB_MODEL: &str = "rule-based";

const SOCRATIC_POOL: [&str; 6] = [
    "Let's slow down and examine the foundation of that claim. What legal rule \
     are you relying on, and where does its authority come from?",
    "Consider the strongest argument the opposing party could make against the \
     position you just took. How would you answer it?",
    "Suppose the facts changed slightly: the agreement was oral rather than \
     written. Would your analysis still hold? Why or why not?",
    "Which precedent is most often cited against your view, and how would you \
     distinguish it from the present facts?",
    "What interest is the law protecting here, and does your reading of the \
     rule serve that interest?",
    "If the court accepted your argument, what rule would it be announcing for \
     future cases? Are you comfortable with where that rule leads?",
];

/// Deterministic Socratic response for the given dialogue state
pub fn socratic_stub(context: &RequestContext) -> String {
    let mut hasher = std::hash::DefaultHasher::new();
    context.session_id.hash(&mut hasher);
    context.messages.len().hash(&mut hasher);
    if let Some(topic) = &context.topic {
        topic.hash(&mut hasher);
    }
    let pick = (hasher.finish() % SOCRATIC_POOL.len() as u64) as usize;
    let body = SOCRATIC_POOL[pick];

    match &context.topic {
        Some(topic) => format!("Staying with {topic}: {body}"),
        None => body.to_string(),
    }
}
