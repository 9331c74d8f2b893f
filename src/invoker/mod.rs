//! Drives the completion service to a usable analysis.
//!
//! Each invocation runs a small state machine (see [`state::step`]):
//! transient and rate-limit failures are retried with per-class backoff,
//! unparseable output is re-requested and eventually replaced by a
//! synthesized fallback. Only provider failures that outlast every attempt
//! reach the caller.

pub mod state;

use std::sync::Arc;

use thiserror::Error;

use crate::clock::{Sleeper, TokioSleeper};
use crate::interpreter;
use crate::models::{AnalysisResult, ChangeDescription};
use crate::prompt;
use crate::providers::{CompletionRequest, CompletionService, ProviderError};

pub use state::{AttemptOutcome, ErrorClass, RetryPolicy, RetryState, Transition};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
/// Default completion length limit.
pub const DEFAULT_MAX_TOKENS: u64 = 2000;
/// Default nucleus sampling bound.
pub const DEFAULT_TOP_P: f64 = 0.9;

/// Failures that survive every retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("provider rate limit persisted after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("provider failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: ProviderError,
    },
}

/// Model and sampling settings sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub top_p: f64,
}

impl SamplingSettings {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// A finished invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub result: AnalysisResult,
    /// The result was synthesized because the model never returned valid JSON.
    pub degraded: bool,
    pub attempts: u32,
}

/// Retrying front for a [`CompletionService`].
pub struct ResilientInvoker {
    service: Arc<dyn CompletionService>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    sampling: SamplingSettings,
}

impl ResilientInvoker {
    /// Create an invoker that sleeps on the tokio timer.
    pub fn new(
        service: Arc<dyn CompletionService>,
        policy: RetryPolicy,
        sampling: SamplingSettings,
    ) -> Self {
        Self::with_sleeper(service, Arc::new(TokioSleeper), policy, sampling)
    }

    pub fn with_sleeper(
        service: Arc<dyn CompletionService>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        sampling: SamplingSettings,
    ) -> Self {
        Self {
            service,
            sleeper,
            policy,
            sampling,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model(&self) -> &str {
        &self.sampling.model
    }

    /// Analyze a change, retrying until success, fallback, or exhaustion.
    pub async fn invoke(&self, change: &ChangeDescription) -> Result<Invocation, InvokeError> {
        let request = self.request_for(change);
        let mut state = RetryState::initial();

        loop {
            let outcome = self.attempt(&request).await;
            match state::step(&self.policy, &state, outcome) {
                Transition::Succeeded(result) => {
                    tracing::debug!(attempt = state.attempt, "analysis parsed");
                    return Ok(Invocation {
                        result,
                        degraded: false,
                        attempts: state.attempt,
                    });
                }
                Transition::FallbackSynthesized { raw, error } => {
                    tracing::warn!(
                        attempts = state.attempt,
                        error = %error,
                        "model output never parsed; using synthesized analysis"
                    );
                    return Ok(Invocation {
                        result: interpreter::synthesize_fallback(change, &raw),
                        degraded: true,
                        attempts: state.attempt,
                    });
                }
                Transition::PermanentlyFailed(err) => {
                    tracing::warn!(error = %err, "analysis failed");
                    return Err(err);
                }
                Transition::Backoff { next } => {
                    tracing::warn!(
                        attempt = state.attempt,
                        max = self.policy.max_attempts,
                        reason = ?next.last_error,
                        backoff_ms = next.next_backoff.as_millis() as u64,
                        "retrying analysis"
                    );
                    self.sleeper.sleep(next.next_backoff).await;
                    state = next;
                }
            }
        }
    }

    async fn attempt(&self, request: &CompletionRequest) -> AttemptOutcome {
        match self.service.complete(request).await {
            Ok(raw) => {
                tracing::debug!(chars = raw.len(), "completion received");
                match interpreter::parse(&raw) {
                    Ok(result) => AttemptOutcome::Parsed(result),
                    Err(error) => {
                        tracing::warn!(error = %error, "could not parse model output");
                        AttemptOutcome::Unparseable { raw, error }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(reason = err.reason(), error = %err, "completion failed");
                AttemptOutcome::Failed(err)
            }
        }
    }

    fn request_for(&self, change: &ChangeDescription) -> CompletionRequest {
        CompletionRequest {
            model: self.sampling.model.clone(),
            system_prompt: prompt::SYSTEM_PROMPT.to_string(),
            prompt: prompt::build_prompt(change),
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            top_p: self.sampling.top_p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileChange, FileStatus, Priority};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    const VALID: &str = r#"{
        "summary": "Null check",
        "purpose": "Avoid crash",
        "testing_focus": ["null input"],
        "potential_risks": [],
        "affected_areas": ["a.ts"],
        "review_priority": "low",
        "estimated_review_time": "5-10 minutes",
        "key_changes": ["a.ts (modified)"]
    }"#;

    /// Replays scripted responses; repeats the last one when the script runs out.
    struct ScriptedService {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        last: Mutex<Option<Result<String, ProviderError>>>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedService {
        fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            last.clone().expect("script is not empty")
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn slept(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn change() -> ChangeDescription {
        ChangeDescription {
            title: "Fix null check".into(),
            description: String::new(),
            files: vec![FileChange {
                path: "a.ts".into(),
                status: FileStatus::Modified,
                additions: 10,
                deletions: 2,
                changes: 12,
                patch: None,
            }],
            commits: vec![],
            base_branch: "main".into(),
            head_branch: String::new(),
            pr_url: String::new(),
        }
    }

    fn invoker(
        service: Arc<ScriptedService>,
        sleeper: Arc<RecordingSleeper>,
    ) -> ResilientInvoker {
        ResilientInvoker::with_sleeper(
            service,
            sleeper,
            RetryPolicy::default(),
            SamplingSettings::for_model("llama-3.3-70b-versatile"),
        )
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let service = ScriptedService::new(vec![Ok(VALID.into())]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let inv = invoker(service.clone(), sleeper.clone())
            .invoke(&change())
            .await
            .unwrap();

        assert!(!inv.degraded);
        assert_eq!(inv.attempts, 1);
        assert_eq!(inv.result.review_priority, Priority::Low);
        assert_eq!(service.calls(), 1);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn request_carries_sampling_settings() {
        let service = ScriptedService::new(vec![Ok(VALID.into())]);
        let sleeper = Arc::new(RecordingSleeper::default());
        invoker(service.clone(), sleeper).invoke(&change()).await.unwrap();

        let calls = service.calls.lock().unwrap();
        let request = &calls[0];
        assert_eq!(request.model, "llama-3.3-70b-versatile");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 2000);
        assert_eq!(request.top_p, 0.9);
        assert!(request.prompt.contains("Fix null check"));
    }

    #[tokio::test]
    async fn always_failing_provider_is_called_max_attempts_times() {
        let service = ScriptedService::new(vec![Err(ProviderError::ApiError("503".into()))]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let err = invoker(service.clone(), sleeper.clone())
            .invoke(&change())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            InvokeError::Exhausted {
                attempts: 3,
                source: ProviderError::ApiError("503".into()),
            }
        );
        assert_eq!(service.calls(), 3);
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn persistent_rate_limit_fails_with_longer_backoff() {
        let service = ScriptedService::new(vec![Err(ProviderError::RateLimited("429".into()))]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let err = invoker(service.clone(), sleeper.clone())
            .invoke(&change())
            .await
            .unwrap_err();

        assert_eq!(err, InvokeError::RateLimited { attempts: 3 });
        assert_eq!(service.calls(), 3);
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_secs(4), Duration::from_secs(8)]
        );
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let service = ScriptedService::new(vec![
            Err(ProviderError::ApiError("connection reset".into())),
            Err(ProviderError::RateLimited("429".into())),
            Ok(format!("```json\n{VALID}\n```")),
        ]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let inv = invoker(service.clone(), sleeper.clone())
            .invoke(&change())
            .await
            .unwrap();

        assert!(!inv.degraded);
        assert_eq!(inv.attempts, 3);
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_secs(1), Duration::from_secs(8)]
        );
    }

    #[tokio::test]
    async fn unparseable_output_falls_back_after_all_attempts() {
        let service = ScriptedService::new(vec![Ok("Sorry, I can't help with that.".into())]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let inv = invoker(service.clone(), sleeper.clone())
            .invoke(&change())
            .await
            .unwrap();

        assert!(inv.degraded);
        assert_eq!(service.calls(), 3);
        assert_eq!(inv.result, interpreter::synthesize_fallback(&change(), ""));
        assert_eq!(
            sleeper.slept(),
            vec![Duration::from_millis(500), Duration::from_millis(500)]
        );
    }

    #[tokio::test]
    async fn parse_failure_then_success_is_not_degraded() {
        let service = ScriptedService::new(vec![Ok("{ truncated".into()), Ok(VALID.into())]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let inv = invoker(service.clone(), sleeper)
            .invoke(&change())
            .await
            .unwrap();

        assert!(!inv.degraded);
        assert_eq!(inv.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_out_backoff() {
        let service = ScriptedService::new(vec![
            Err(ProviderError::ApiError("503".into())),
            Ok(VALID.into()),
        ]);
        let invoker = ResilientInvoker::new(
            service,
            RetryPolicy::default(),
            SamplingSettings::for_model("m"),
        );
        let start = tokio::time::Instant::now();
        invoker.invoke(&change()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
