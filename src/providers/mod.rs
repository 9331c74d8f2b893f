//! Completion service trait and LLM integration.
//!
//! The analysis pipeline only ever sees [`CompletionService`]: a request goes
//! in, free-form text or a typed failure comes out. [`rig::RigProvider`]
//! implements it over rig-core.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a completion service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider reported a rate-limit or quota condition.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    /// Short, user-facing reason for a provider failure.
    pub fn reason(&self) -> &'static str {
        match self {
            ProviderError::RateLimited(_) => "Rate limited by API",
            ProviderError::NotConfigured(_) => "Provider not configured",
            ProviderError::ApiError(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("503")
                    || lower.contains("service unavailable")
                    || lower.contains("high demand")
                {
                    "High model load"
                } else if lower.contains("529") || lower.contains("overloaded") {
                    "API overloaded"
                } else if lower.contains("502") {
                    "API gateway error"
                } else if lower.contains("401") || lower.contains("unauthorized") {
                    "Authentication failed"
                } else if lower.contains("timeout") || lower.contains("timed out") {
                    "Request timed out"
                } else if lower.contains("connection") {
                    "Connection error"
                } else {
                    "API error"
                }
            }
        }
    }
}

/// Everything a provider needs for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub top_p: f64,
}

/// An LLM that turns a prompt into text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
