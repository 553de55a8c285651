//! Cost estimation and per-request budget enforcement
//!
//! Pricing is per 1K tokens, keyed by model-name substring. Cost tracking is
//! best-effort: an unknown model degrades to a zero-cost estimate rather
//! than failing the call.

use once_cell::sync::Lazy;
use tracing::debug;

/// Per-model unit pricing in USD per 1K tokens
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Ordered from most to least specific; first substring match wins
static MODEL_PRICING: Lazy<Vec<(&'static str, ModelPricing)>> = Lazy::new(|| {
    vec![
        (
            "gpt-4-turbo",
            ModelPricing {
                input_per_1k: 0.01,
                output_per_1k: 0.03,
            },
        ),
        (
            "gpt-4o",
            ModelPricing {
                input_per_1k: 0.005,
                output_per_1k: 0.015,
            },
        ),
        (
            "gpt-4",
            ModelPricing {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        ),
        (
            "gpt-3.5-turbo",
            ModelPricing {
                input_per_1k: 0.0015,
                output_per_1k: 0.002,
            },
        ),
        (
            "claude-3-opus",
            ModelPricing {
                input_per_1k: 0.015,
                output_per_1k: 0.075,
            },
        ),
        (
            "claude-3-sonnet",
            ModelPricing {
                input_per_1k: 0.003,
                output_per_1k: 0.015,
            },
        ),
        (
            "claude-3-haiku",
            ModelPricing {
                input_per_1k: 0.00025,
                output_per_1k: 0.00125,
            },
        ),
        (
            "gemini-pro",
            ModelPricing {
                input_per_1k: 0.0005,
                output_per_1k: 0.0015,
            },
        ),
    ]
});

/// Cost estimate for one request
#[derive(Debug, Clone, serde::Serialize)]
pub struct CostEstimate {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub within_budget: bool,
}

/// Converts token counts to monetary cost and enforces the request ceiling
#[derive(Debug, Clone, Default)]
pub struct CostGuard;

impl CostGuard {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the cost of a call and mark whether it fits under `ceiling`
    pub fn estimate(
        &self,
        input_tokens: u32,
        output_tokens: u32,
        model: &str,
        ceiling: f64,
    ) -> CostEstimate {
        let pricing = Self::pricing_for(model);
        let (input_cost, output_cost) = match pricing {
            Some(p) => (
                f64::from(input_tokens) / 1000.0 * p.input_per_1k,
                f64::from(output_tokens) / 1000.0 * p.output_per_1k,
            ),
            None => {
                debug!(model, "no pricing entry; treating cost as zero");
                (0.0, 0.0)
            }
        };
        let total_cost = input_cost + output_cost;
        CostEstimate {
            input_cost,
            output_cost,
            total_cost,
            within_budget: total_cost <= ceiling,
        }
    }

    /// Re-check an estimate against a ceiling
    pub fn check(&self, estimate: &CostEstimate, ceiling: f64) -> bool {
        estimate.total_cost <= ceiling
    }

    /// Cost of a completed call from its actual token usage
    pub fn actual_cost(&self, input_tokens: u32, output_tokens: u32, model: &str) -> f64 {
        self.estimate(input_tokens, output_tokens, model, f64::MAX)
            .total_cost
    }

    fn pricing_for(model: &str) -> Option<ModelPricing> {
        let model_lower = model.to_lowercase();
        MODEL_PRICING
            .iter()
            .find(|(pattern, _)| model_lower.contains(pattern))
            .map(|(_, pricing)| *pricing)
    }
}
