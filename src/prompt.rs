//! Prompt construction for change analysis.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::{AnalysisResult, ChangeDescription};

/// System prompt sent with every analysis request.
pub const SYSTEM_PROMPT: &str = "You are an expert code reviewer. Respond only with valid JSON.";

/// Characters of the description included in the prompt.
const DESCRIPTION_LIMIT: usize = 1500;
/// Files listed individually before summarising the rest.
const FILE_LIMIT: usize = 30;
/// Commits listed individually before summarising the rest.
const COMMIT_LIMIT: usize = 15;
/// Characters of each commit message included.
const COMMIT_MESSAGE_LIMIT: usize = 150;
/// Changed lines above which a file is called out as large.
const LARGE_CHANGE_LINES: u64 = 500;
/// Large files called out by name.
const LARGE_CHANGE_LIMIT: usize = 3;
/// File extensions listed in the statistics.
const TOP_EXTENSIONS: usize = 5;

static RESPONSE_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    let schema = schemars::schema_for!(AnalysisResult);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
});

/// Build the user prompt for a change.
pub fn build_prompt(change: &ChangeDescription) -> String {
    let additions = change.total_additions();
    let deletions = change.total_deletions();
    let volume = change.total_volume();
    let file_count = change.files.len();

    let mut prompt = String::new();

    prompt.push_str(
        "You are a senior staff engineer preparing reviewers for a pull request. \
         Be specific to this change: cite files and numbers, and avoid generic advice.\n\n",
    );

    prompt.push_str("## Pull Request\n\n");
    prompt.push_str(&format!("Title: {}\n", change.title));
    let description = if change.description.trim().is_empty() {
        "No description provided".to_string()
    } else {
        change.description.chars().take(DESCRIPTION_LIMIT).collect()
    };
    prompt.push_str(&format!("Description: {description}\n"));
    prompt.push_str(&format!("Base Branch: {}\n", change.base_branch));
    prompt.push_str(&format!("Head Branch: {}\n\n", change.head_branch));

    prompt.push_str("## Statistics\n\n");
    prompt.push_str(&format!("- Total files: {file_count}\n"));
    prompt.push_str(&format!("- Additions: +{additions} lines\n"));
    prompt.push_str(&format!("- Deletions: -{deletions} lines\n"));
    prompt.push_str(&format!("- Change volume: {volume} lines\n"));
    let extensions = top_extensions(change);
    if !extensions.is_empty() {
        prompt.push_str(&format!("- File types: {extensions}\n"));
    }
    let large: Vec<String> = change
        .files
        .iter()
        .filter(|f| f.volume() > LARGE_CHANGE_LINES)
        .take(LARGE_CHANGE_LIMIT)
        .map(|f| format!("{} ({} lines)", f.path, f.volume()))
        .collect();
    if !large.is_empty() {
        prompt.push_str(&format!(
            "- Large changes (>{LARGE_CHANGE_LINES} lines): {}\n",
            large.join(", ")
        ));
    }
    prompt.push('\n');

    prompt.push_str(&format!("## Files Changed ({file_count} files)\n\n"));
    for (i, file) in change.files.iter().take(FILE_LIMIT).enumerate() {
        prompt.push_str(&format!(
            "  {}. {} ({}): +{}/-{}\n",
            i + 1,
            file.path,
            file.status,
            file.additions,
            file.deletions
        ));
    }
    if file_count > FILE_LIMIT {
        prompt.push_str(&format!("  ... and {} more files\n", file_count - FILE_LIMIT));
    }
    prompt.push('\n');

    prompt.push_str(&format!("## Commits ({} commits)\n\n", change.commits.len()));
    if change.commits.is_empty() {
        prompt.push_str("No commits information\n");
    }
    for (i, commit) in change.commits.iter().take(COMMIT_LIMIT).enumerate() {
        let message: String = commit.message.chars().take(COMMIT_MESSAGE_LIMIT).collect();
        prompt.push_str(&format!("  {}. {message}\n", i + 1));
    }
    if change.commits.len() > COMMIT_LIMIT {
        prompt.push_str(&format!(
            "  ... and {} more commits\n",
            change.commits.len() - COMMIT_LIMIT
        ));
    }
    prompt.push('\n');

    prompt.push_str("## Response Format\n\n");
    prompt.push_str(
        "Respond with a single JSON object with exactly these fields: summary, purpose, \
         testing_focus, potential_risks, affected_areas, review_priority, \
         estimated_review_time, key_changes.\n",
    );
    prompt.push_str(&format!(
        "review_priority must be one of low, medium, high, critical. \
         Reference the actual numbers above ({additions} additions, {deletions} deletions \
         across {file_count} files) in the summary.\n\n"
    ));
    prompt.push_str("The object must match this JSON schema:\n\n```json\n");
    prompt.push_str(&RESPONSE_SCHEMA);
    prompt.push_str("\n```\n\n");
    prompt.push_str("Return ONLY valid JSON. No markdown, no code blocks, no extra text.");

    prompt
}

/// The most common file extensions, formatted as `rs(4), toml(1)`.
fn top_extensions(change: &ChangeDescription) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for file in change.files.iter().take(FILE_LIMIT) {
        let name = file.path.rsplit('/').next().unwrap_or(&file.path);
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "unknown",
        };
        *counts.entry(ext).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    counts
        .into_iter()
        .take(TOP_EXTENSIONS)
        .map(|(ext, n)| format!("{ext}({n})"))
        .collect::<Vec<_>>()
        .join(", ")
}
