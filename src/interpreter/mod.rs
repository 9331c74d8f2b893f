//! Turning raw model output into an [`AnalysisResult`].
//!
//! [`parse`] is strict: the text must contain a JSON object with every
//! result field. [`synthesize_fallback`] never fails and builds a coarse
//! result from the change statistics alone.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::{AnalysisResult, ChangeDescription, Priority};

/// Maximum length of raw model text carried in a [`ParseError`].
const PREVIEW_LEN: usize = 200;

/// Files used to derive affected areas and key changes in a fallback.
const FALLBACK_SAMPLE: usize = 5;

/// Characters of the description kept as the fallback purpose.
const FALLBACK_PURPOSE_LEN: usize = 200;

const FALLBACK_TESTING_FOCUS: [&str; 3] = [
    "Test the modified functionality",
    "Check for breaking changes",
    "Verify edge cases",
];

const FALLBACK_RISKS: [&str; 2] = [
    "Changes may affect existing functionality",
    "Review for potential bugs",
];

/// Model output that could not be decoded into an analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("invalid analysis JSON: {message}. Response: {preview}")]
    Invalid { message: String, preview: String },
}

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").expect("fence regex is valid")
});

/// Decode model output into an analysis.
///
/// Tries the trimmed text, the outermost `{...}` slice, then the contents
/// of any markdown code fences. The first candidate that decodes wins; the
/// error from the first candidate is reported when none do.
pub fn parse(raw: &str) -> Result<AnalysisResult, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut first_error = None;
    for candidate in extract_json_candidates(trimmed) {
        match serde_json::from_str::<AnalysisResult>(&candidate) {
            Ok(result) => return Ok(result),
            Err(e) => {
                first_error.get_or_insert(e.to_string());
            }
        }
    }

    Err(ParseError::Invalid {
        message: first_error.unwrap_or_else(|| "no JSON object found".to_string()),
        preview: preview(trimmed),
    })
}

/// Candidate JSON strings from a response, most likely first.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = vec![text.to_string()];

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            let slice = &text[start..=end];
            if slice != text {
                candidates.push(slice.to_string());
            }
        }
    }

    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                candidates.push(inner.to_string());
            }
        }
    }

    candidates
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Build a coarse analysis from the change statistics.
///
/// Deterministic in `change`; `raw` is only logged.
pub fn synthesize_fallback(change: &ChangeDescription, raw: &str) -> AnalysisResult {
    tracing::debug!(raw_len = raw.len(), "synthesizing fallback analysis");

    let volume = change.total_volume();
    let (review_priority, estimated_review_time) = volume_band(volume);

    let purpose = if change.description.trim().is_empty() {
        "No description provided".to_string()
    } else {
        change.description.chars().take(FALLBACK_PURPOSE_LEN).collect()
    };

    let mut seen = HashSet::new();
    let affected_areas = change
        .sample_paths(FALLBACK_SAMPLE)
        .into_iter()
        .map(top_level_segment)
        .filter(|area| seen.insert(area.to_string()))
        .map(str::to_string)
        .collect();

    let key_changes = change
        .files
        .iter()
        .take(FALLBACK_SAMPLE)
        .map(|f| format!("{} ({})", f.path, f.status))
        .collect();

    AnalysisResult {
        summary: format!(
            "This PR modifies {} files with {} total changes.",
            change.files.len(),
            volume
        ),
        purpose,
        testing_focus: FALLBACK_TESTING_FOCUS.iter().map(|s| s.to_string()).collect(),
        potential_risks: FALLBACK_RISKS.iter().map(|s| s.to_string()).collect(),
        affected_areas,
        review_priority,
        estimated_review_time: estimated_review_time.to_string(),
        key_changes,
    }
}

/// Priority and review-time estimate for a change volume.
pub fn volume_band(volume: u64) -> (Priority, &'static str) {
    match volume {
        0..50 => (Priority::Low, "5-10 minutes"),
        50..200 => (Priority::Medium, "15-25 minutes"),
        200..500 => (Priority::High, "30-45 minutes"),
        _ => (Priority::Critical, "1+ hours"),
    }
}

/// First path component, or the whole path for top-level files.
fn top_level_segment(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.split('/').next().unwrap_or(path)
}
