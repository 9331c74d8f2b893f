//! rig-core integration for LLM completions.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Groq, Anthropic, OpenAI, Cohere, Gemini,
//! Perplexity, DeepSeek, xAI, and any OpenAI-compatible API.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::ProviderName;

use super::{CompletionRequest, CompletionService, ProviderError};

/// Prompt a tool-less agent built from a rig-core client.
///
/// `$params` carries provider-specific extras (`top_p`) as an optional
/// JSON object merged into the request body.
macro_rules! prompt_simple {
    ($client:expr, $request:expr, $params:expr, $label:expr) => {{
        let mut builder = $client
            .agent(&$request.model)
            .preamble(&$request.system_prompt)
            .temperature($request.temperature)
            .max_tokens($request.max_tokens);
        if let Some(params) = $params {
            builder = builder.additional_params(params);
        }
        let agent = builder.build();
        agent
            .prompt($request.prompt.as_str())
            .await
            .map_err(|e| classify_failure($label, &e.to_string()))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based completion service.
///
/// The provider name in config selects which rig-core client is built.
/// A client is created per call; rig clients are cheap wrappers around a
/// shared HTTP connection pool.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    /// Create a provider, failing early when no API key is configured.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var(),
            )));
        }
        Ok(Self { config })
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            )
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }

    /// Extra sampling parameters for providers speaking the OpenAI wire format.
    ///
    /// Anthropic, Cohere, and Gemini nest or reject a top-level `top_p`, so
    /// they get temperature and max tokens only.
    fn sampling_params(&self, request: &CompletionRequest) -> Option<serde_json::Value> {
        match self.config.name {
            ProviderName::Groq
            | ProviderName::OpenAI
            | ProviderName::OpenAICompatible
            | ProviderName::DeepSeek
            | ProviderName::XAI
            | ProviderName::Perplexity => Some(serde_json::json!({ "top_p": request.top_p })),
            ProviderName::Anthropic | ProviderName::Cohere | ProviderName::Gemini => None,
        }
    }
}

#[async_trait]
impl CompletionService for RigProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let params = self.sampling_params(request);

        let response = match self.config.name {
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, request, params, "Groq")
            }
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, request, params, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(client, request, params, "OpenAI")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, request, params, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, request, params, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, request, params, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, request, params, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, request, params, "xAI")
            }
            ProviderName::OpenAICompatible => {
                self.require_base_url()?;
                let client = self.build_openai_client(api_key)?;
                prompt_simple!(client, request, params, "OpenAI-compatible")
            }
        }?;

        tracing::debug!(
            provider = %self.config.name,
            chars = response.len(),
            "received completion"
        );
        Ok(response.trim().to_string())
    }
}

/// Turn a rig-core error message into a typed provider failure.
///
/// Rate limiting and quota exhaustion surface as HTTP 429 or as provider
/// specific wording inside the message body; everything else is a generic
/// API error.
pub fn classify_failure(label: &str, message: &str) -> ProviderError {
    let lower = message.to_lowercase();
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
    {
        ProviderError::RateLimited(format!("{label}: {message}"))
    } else {
        ProviderError::ApiError(format!("{label} API error: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: ProviderName, api_key: Option<&str>, base_url: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name,
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: base_url.map(str::to_string),
            api_key: api_key.map(str::to_string),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "llama-3.3-70b-versatile".into(),
            system_prompt: "Respond only with valid JSON.".into(),
            prompt: "{}".into(),
            temperature: 0.3,
            max_tokens: 2000,
            top_p: 0.9,
        }
    }

    #[test]
    fn new_provider_missing_api_key() {
        match RigProvider::new(config(ProviderName::Groq, None, None)) {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("API key"), "got: {msg}");
                assert!(msg.contains("GROQ_API_KEY"), "got: {msg}");
            }
            Ok(_) => panic!("expected error for missing API key"),
        }
    }

    #[test]
    fn new_provider_with_api_key() {
        assert!(RigProvider::new(config(ProviderName::Groq, Some("gsk-test"), None)).is_ok());
    }

    #[test]
    fn require_base_url_missing() {
        let provider =
            RigProvider::new(config(ProviderName::OpenAICompatible, Some("k"), None)).unwrap();
        let err = provider.require_base_url().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn require_base_url_present() {
        let provider = RigProvider::new(config(
            ProviderName::OpenAICompatible,
            Some("k"),
            Some("http://localhost:11434/v1"),
        ))
        .unwrap();
        assert_eq!(provider.require_base_url().unwrap(), "http://localhost:11434/v1");
    }

    #[test]
    fn sampling_params_only_for_openai_style_providers() {
        let groq = RigProvider::new(config(ProviderName::Groq, Some("k"), None)).unwrap();
        assert_eq!(
            groq.sampling_params(&request()),
            Some(serde_json::json!({ "top_p": 0.9 }))
        );
        let anthropic = RigProvider::new(config(ProviderName::Anthropic, Some("k"), None)).unwrap();
        assert!(anthropic.sampling_params(&request()).is_none());
    }

    #[test]
    fn classify_429_as_rate_limited() {
        let err = classify_failure(
            "Groq",
            "CompletionError: HttpError: Invalid status code 429 Too Many Requests",
        );
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("Groq"));
    }

    #[test]
    fn classify_quota_as_rate_limited() {
        assert!(classify_failure("Groq", "You exceeded your current quota").is_rate_limited());
        assert!(classify_failure("Groq", "Rate limit reached for model").is_rate_limited());
        assert!(classify_failure("Groq", "error code: rate_limit_exceeded").is_rate_limited());
    }

    #[test]
    fn classify_other_failures_as_api_errors() {
        let err = classify_failure("Groq", "HTTP 503 Service Unavailable");
        assert_eq!(
            err,
            ProviderError::ApiError("Groq API error: HTTP 503 Service Unavailable".into())
        );
        assert!(!classify_failure("Groq", "connection refused").is_rate_limited());
    }
}
