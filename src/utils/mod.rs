//! Utility modules for the moot gateway
//!
//! - **error**: caller-facing error taxonomy and result alias
//! - **tokens**: token budget estimation against a provider context window
//! - **cost**: pricing table and per-request cost guard

pub mod cost;
pub mod error;
pub mod tokens;

pub use cost::{CostEstimate, CostGuard};
pub use error::{GatewayError, Result};
pub use tokens::{TokenBudgetEstimator, TokenEstimate};
