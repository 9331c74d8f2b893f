//! Change description types: the input to every analysis.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// Descriptions longer than this (in characters) are truncated.
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Marker appended to a truncated description.
const TRUNCATION_MARKER: &str = "... (truncated)";

/// Reasons a change description is rejected before analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {len} characters long, maximum is {max}")]
    TitleTooLong { len: usize, max: usize },

    #[error("at least one file must be provided")]
    NoFiles,

    #[error("too many files: {count} (maximum {max} files allowed)")]
    TooManyFiles { count: usize, max: usize },
}

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single file touched by the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root.
    #[serde(rename = "filename", alias = "path")]
    pub path: String,
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    /// Total changes as reported by the forge. Informational only.
    #[serde(default)]
    pub changes: u32,
    /// Unified diff text for this file, when the caller has it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl FileChange {
    /// Lines added plus lines removed.
    pub fn volume(&self) -> u64 {
        u64::from(self.additions) + u64::from(self.deletions)
    }
}

/// A commit included in the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(alias = "id")]
    pub sha: String,
    pub message: String,
    pub author: String,
}

/// Description of a pull request submitted for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescription {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub files: Vec<FileChange>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commits: Vec<Commit>,
    #[serde(default = "default_base_branch", deserialize_with = "null_as_base_branch")]
    pub base_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub head_branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pr_url: String,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_base_branch<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_base_branch))
}

impl ChangeDescription {
    /// Check the invariants and normalise the description length.
    ///
    /// Consumes `self` so a validated value can't be confused with a raw one
    /// further down the pipeline.
    pub fn validated(mut self, max_files: usize) -> Result<Self, ValidationError> {
        let title_len = self.title.chars().count();
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if title_len > MAX_TITLE_LEN {
            return Err(ValidationError::TitleTooLong {
                len: title_len,
                max: MAX_TITLE_LEN,
            });
        }
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles);
        }
        if self.files.len() > max_files {
            return Err(ValidationError::TooManyFiles {
                count: self.files.len(),
                max: max_files,
            });
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            let mut truncated: String =
                self.description.chars().take(MAX_DESCRIPTION_LEN).collect();
            truncated.push_str(TRUNCATION_MARKER);
            self.description = truncated;
        }

        Ok(self)
    }

    /// Sum of added lines across all files.
    pub fn total_additions(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.additions)).sum()
    }

    /// Sum of removed lines across all files.
    pub fn total_deletions(&self) -> u64 {
        self.files.iter().map(|f| u64::from(f.deletions)).sum()
    }

    /// Total change volume (additions + deletions).
    pub fn total_volume(&self) -> u64 {
        self.files.iter().map(FileChange::volume).sum()
    }

    /// Paths of the first `n` files, in submission order.
    pub fn sample_paths(&self, n: usize) -> Vec<&str> {
        self.files.iter().take(n).map(|f| f.path.as_str()).collect()
    }

    /// A reduced copy keeping only the leading files and commits.
    pub fn abbreviated(&self, max_files: usize, max_commits: usize) -> Self {
        Self {
            files: self.files.iter().take(max_files).cloned().collect(),
            commits: self.commits.iter().take(max_commits).cloned().collect(),
            ..self.clone()
        }
    }
}
