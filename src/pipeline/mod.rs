//! Analysis pipeline: validation, caching, and invocation.
//!
//! `analyze` is the full path: validate, fingerprint, serve from cache or
//! invoke the model, then cache the result. `analyze_quick` trims the change
//! and skips the cache. `analyze_batch` runs many changes concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheStats, CachedAnalysis, ResultCache};
use crate::config::Config;
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::invoker::{InvokeError, Invocation, ResilientInvoker, RetryPolicy, SamplingSettings};
use crate::models::{AnalysisResult, ChangeDescription};
use crate::models::change::ValidationError;
use crate::providers::{CompletionService, ProviderError};

/// Default number of concurrent analyses in a batch.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Errors surfaced to callers of the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider rate limited after {attempts} attempts; try again later")]
    ProviderRateLimited { attempts: u32 },

    #[error("provider unavailable after {attempts} attempts: {source}")]
    ProviderUnavailable {
        attempts: u32,
        source: ProviderError,
    },

    #[error("analysis task did not complete: {0}")]
    TaskFailed(String),
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        PipelineError::InvalidInput(err.to_string())
    }
}

impl From<InvokeError> for PipelineError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::RateLimited { attempts } => {
                PipelineError::ProviderRateLimited { attempts }
            }
            InvokeError::Exhausted { attempts, source } => {
                PipelineError::ProviderUnavailable { attempts, source }
            }
        }
    }
}

/// Which pipeline path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Full,
    Quick,
}

/// A finished analysis plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub context: AnalysisResult,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub processing_time_ms: u64,
    /// Files sent to the model (fewer than `total_files` in quick mode).
    pub files_analyzed: usize,
    pub commits_analyzed: usize,
    pub total_files: usize,
    pub model: String,
    pub cached: bool,
    /// The context was synthesized from statistics, not produced by the model.
    pub degraded: bool,
    pub mode: AnalysisMode,
    pub fingerprint: Fingerprint,
}

/// Input limits applied before any model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub max_files: usize,
    pub quick_max_files: usize,
    pub quick_max_commits: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_files: 100,
            quick_max_files: 10,
            quick_max_commits: 5,
        }
    }
}

/// Composes the result cache and the resilient invoker.
///
/// Cheap to clone; clones share the cache and the invoker.
#[derive(Clone)]
pub struct AnalysisPipeline {
    invoker: Arc<ResilientInvoker>,
    cache: Arc<ResultCache>,
    limits: PipelineLimits,
}

impl AnalysisPipeline {
    pub fn new(invoker: ResilientInvoker, cache: Arc<ResultCache>, limits: PipelineLimits) -> Self {
        Self {
            invoker: Arc::new(invoker),
            cache,
            limits,
        }
    }

    /// Build a pipeline from loaded configuration around `service`.
    pub fn from_config(config: &Config, service: Arc<dyn CompletionService>) -> Self {
        let analysis = &config.analysis;
        let sampling = SamplingSettings {
            model: config.provider.model.clone(),
            temperature: analysis.temperature,
            max_tokens: analysis.max_tokens,
            top_p: analysis.top_p,
        };
        let invoker = ResilientInvoker::new(
            service,
            RetryPolicy::with_max_attempts(analysis.max_attempts),
            sampling,
        );
        let cache = Arc::new(ResultCache::new(
            config.cache.enabled,
            Duration::from_secs(config.cache.ttl_secs),
        ));
        let limits = PipelineLimits {
            max_files: analysis.max_files,
            quick_max_files: analysis.quick_max_files,
            quick_max_commits: analysis.quick_max_commits,
        };
        Self::new(invoker, cache, limits)
    }

    pub fn model(&self) -> &str {
        self.invoker.model()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Analyze a change, serving a cached result when one is fresh.
    pub async fn analyze(
        &self,
        change: ChangeDescription,
    ) -> Result<AnalysisResponse, PipelineError> {
        let start = Instant::now();
        let change = change.validated(self.limits.max_files)?;
        let key = fingerprint(&change);

        tracing::info!(
            title = %change.title,
            files = change.files.len(),
            commits = change.commits.len(),
            key = %key,
            "analyzing change"
        );

        if let Some(CachedAnalysis { result, degraded }) = self.cache.get(&key) {
            let response = self
                .respond(&change, &change, result, key, AnalysisMode::Full, start)
                .cached();
            let response = if degraded { response.degraded() } else { response };
            tracing::info!(
                elapsed_ms = response.metadata.processing_time_ms,
                degraded,
                "returning cached analysis"
            );
            return Ok(response);
        }

        let Invocation {
            result, degraded, ..
        } = self.invoker.invoke(&change).await?;

        // Fallback results are cached like model results, flagged as degraded.
        self.cache.set(
            key.clone(),
            CachedAnalysis {
                result: result.clone(),
                degraded,
            },
            &change.title,
        );

        let response = self.respond(&change, &change, result, key, AnalysisMode::Full, start);
        let response = if degraded { response.degraded() } else { response };
        tracing::info!(
            elapsed_ms = response.metadata.processing_time_ms,
            degraded,
            "analysis complete"
        );
        Ok(response)
    }

    /// Analyze only the leading files and commits, bypassing the cache.
    pub async fn analyze_quick(
        &self,
        change: ChangeDescription,
    ) -> Result<AnalysisResponse, PipelineError> {
        let start = Instant::now();
        let change = change.validated(self.limits.max_files)?;
        let key = fingerprint(&change);
        let trimmed =
            change.abbreviated(self.limits.quick_max_files, self.limits.quick_max_commits);

        tracing::info!(
            title = %change.title,
            files = trimmed.files.len(),
            total_files = change.files.len(),
            "quick analysis"
        );

        let Invocation {
            result, degraded, ..
        } = self.invoker.invoke(&trimmed).await?;

        let response = self.respond(&change, &trimmed, result, key, AnalysisMode::Quick, start);
        Ok(if degraded { response.degraded() } else { response })
    }

    /// Analyze many changes with at most `max_concurrent` in flight.
    ///
    /// Results are returned in input order. Concurrent misses on the same
    /// fingerprint each call the model; the last to finish owns the entry.
    pub async fn analyze_batch(
        &self,
        changes: Vec<ChangeDescription>,
        max_concurrent: usize,
    ) -> Vec<Result<AnalysisResponse, PipelineError>> {
        self.fan_out(changes, max_concurrent, AnalysisMode::Full).await
    }

    /// Quick-analyze many changes with at most `max_concurrent` in flight.
    pub async fn analyze_quick_batch(
        &self,
        changes: Vec<ChangeDescription>,
        max_concurrent: usize,
    ) -> Vec<Result<AnalysisResponse, PipelineError>> {
        self.fan_out(changes, max_concurrent, AnalysisMode::Quick).await
    }

    async fn fan_out(
        &self,
        changes: Vec<ChangeDescription>,
        max_concurrent: usize,
        mode: AnalysisMode,
    ) -> Vec<Result<AnalysisResponse, PipelineError>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<Result<AnalysisResponse, PipelineError>>> =
            (0..changes.len()).map(|_| None).collect();
        let mut task_index = HashMap::new();

        for (index, change) in changes.into_iter().enumerate() {
            let pipeline = self.clone();
            let sem = Arc::clone(&semaphore);
            let handle = join_set.spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| PipelineError::TaskFailed(e.to_string()))?;
                match mode {
                    AnalysisMode::Full => pipeline.analyze(change).await,
                    AnalysisMode::Quick => pipeline.analyze_quick(change).await,
                }
            });
            task_index.insert(handle.id(), index);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&index) = task_index.get(&id) {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "analysis task failed");
                    if let Some(&index) = task_index.get(&e.id()) {
                        slots[index] = Some(Err(PipelineError::TaskFailed(e.to_string())));
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(PipelineError::TaskFailed("task was lost".to_string())))
            })
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached analysis; returns how many were removed.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    fn respond(
        &self,
        submitted: &ChangeDescription,
        analyzed: &ChangeDescription,
        context: AnalysisResult,
        key: Fingerprint,
        mode: AnalysisMode,
        start: Instant,
    ) -> AnalysisResponse {
        AnalysisResponse {
            success: true,
            context,
            metadata: ResponseMetadata {
                processing_time_ms: start.elapsed().as_millis() as u64,
                files_analyzed: analyzed.files.len(),
                commits_analyzed: analyzed.commits.len(),
                total_files: submitted.files.len(),
                model: self.invoker.model().to_string(),
                cached: false,
                degraded: false,
                mode,
                fingerprint: key,
            },
        }
    }
}

impl AnalysisResponse {
    fn cached(mut self) -> Self {
        self.metadata.cached = true;
        self
    }

    fn degraded(mut self) -> Self {
        self.metadata.degraded = true;
        self
    }
}
