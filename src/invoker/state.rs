//! Pure retry transitions for a single analysis invocation.
//!
//! [`step`] decides what happens after one attempt; the async driver in
//! [`super::ResilientInvoker`] only performs the side effects (calling the
//! service, sleeping, synthesizing a fallback).

use std::time::Duration;

use crate::interpreter::ParseError;
use crate::models::AnalysisResult;
use crate::providers::ProviderError;

use super::InvokeError;

/// Default number of attempts per invocation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry bounds and delay schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// First delay after a generic failure; doubles per attempt.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// First delay after a rate-limit failure; doubles per attempt.
    pub rate_limit_base: Duration,
    pub rate_limit_cap: Duration,
    /// Fixed delay before re-asking after an unparseable response.
    pub parse_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            rate_limit_base: Duration::from_secs(4),
            rate_limit_cap: Duration::from_secs(30),
            parse_retry_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt bound; zero is treated as one.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay after a generic failure on `attempt` (1-based).
    pub fn generic_backoff(&self, attempt: u32) -> Duration {
        exponential(self.base_delay, attempt).min(self.max_delay)
    }

    /// Delay after a rate-limit failure on `attempt` (1-based).
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        exponential(self.rate_limit_base, attempt).min(self.rate_limit_cap)
    }
}

fn exponential(base: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1);
    base.saturating_mul(2u32.saturating_pow(exp))
}

/// Why the previous attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    Transient,
    Unparseable,
}

/// Progress through one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based index of the attempt about to run or just run.
    pub attempt: u32,
    pub last_error: Option<ErrorClass>,
    /// Delay that precedes `attempt`; zero for the first.
    pub next_backoff: Duration,
}

impl RetryState {
    pub fn initial() -> Self {
        Self {
            attempt: 1,
            last_error: None,
            next_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Result of a single call plus parse.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Parsed(AnalysisResult),
    Unparseable { raw: String, error: ParseError },
    Failed(ProviderError),
}

/// What the driver does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Succeeded(AnalysisResult),
    /// Sleep for `next.next_backoff`, then run attempt `next.attempt`.
    Backoff { next: RetryState },
    /// Out of attempts on unparseable output; build a result from the input.
    FallbackSynthesized { raw: String, error: ParseError },
    PermanentlyFailed(InvokeError),
}

/// Decide the transition after `state.attempt` produced `outcome`.
pub fn step(policy: &RetryPolicy, state: &RetryState, outcome: AttemptOutcome) -> Transition {
    let attempt = state.attempt;
    let can_retry = attempt < policy.max_attempts;

    let backoff = |class: ErrorClass, delay: Duration| Transition::Backoff {
        next: RetryState {
            attempt: attempt + 1,
            last_error: Some(class),
            next_backoff: delay,
        },
    };

    match outcome {
        AttemptOutcome::Parsed(result) => Transition::Succeeded(result),
        AttemptOutcome::Unparseable { raw, error } => {
            if can_retry {
                backoff(ErrorClass::Unparseable, policy.parse_retry_delay)
            } else {
                Transition::FallbackSynthesized { raw, error }
            }
        }
        AttemptOutcome::Failed(err) if err.is_rate_limited() => {
            if can_retry {
                backoff(ErrorClass::RateLimited, policy.rate_limit_backoff(attempt))
            } else {
                Transition::PermanentlyFailed(InvokeError::RateLimited { attempts: attempt })
            }
        }
        AttemptOutcome::Failed(err) => {
            if can_retry {
                backoff(ErrorClass::Transient, policy.generic_backoff(attempt))
            } else {
                Transition::PermanentlyFailed(InvokeError::Exhausted {
                    attempts: attempt,
                    source: err,
                })
            }
        }
    }
}
