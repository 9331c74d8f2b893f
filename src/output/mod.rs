//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::cache::CacheStats;
use crate::pipeline::{AnalysisResponse, PipelineError};

/// Trait for rendering analyses to an output format.
pub trait OutputRenderer {
    /// Render a successful analysis.
    fn render(&self, response: &AnalysisResponse) -> String;

    /// Render a failed analysis of the change titled `title`.
    fn render_error(&self, title: &str, error: &PipelineError) -> String;

    /// Render cache statistics.
    fn render_cache_stats(&self, stats: &CacheStats) -> String;
}
