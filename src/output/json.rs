//! JSON output renderer.
//!
//! Outputs `{"success": true, "context": {...}, "metadata": {...}}` per
//! analysis, `{"success": false, "error": ...}` per failure.

use crate::cache::CacheStats;
use crate::output::OutputRenderer;
use crate::pipeline::{AnalysisResponse, PipelineError};

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, response: &AnalysisResponse) -> String {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
    }

    fn render_error(&self, title: &str, error: &PipelineError) -> String {
        let output = serde_json::json!({
            "success": false,
            "title": title,
            "error": error.to_string(),
        });
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn render_cache_stats(&self, stats: &CacheStats) -> String {
        serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string())
    }
}
