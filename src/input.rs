//! Reading change descriptions from files or stdin.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::models::ChangeDescription;

/// Where a batch of change descriptions comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => f.write_str("<stdin>"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors loading change descriptions.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {source_name}: {error}")]
    Read {
        source_name: String,
        error: std::io::Error,
    },

    #[error("invalid change description in {source_name}: {error}")]
    Decode {
        source_name: String,
        error: serde_json::Error,
    },
}

/// A document holds one change or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<ChangeDescription>),
    One(Box<ChangeDescription>),
}

/// Decode the changes in a JSON document.
pub fn parse_changes(
    json: &str,
    source: &InputSource,
) -> Result<Vec<ChangeDescription>, InputError> {
    // Decode the single-object shape directly first so its field errors
    // are reported instead of the untagged enum's generic message.
    let trimmed = json.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<ChangeDescription>(json)
            .map(|change| vec![change])
            .map_err(|error| InputError::Decode {
                source_name: source.to_string(),
                error,
            });
    }
    match serde_json::from_str::<Document>(json) {
        Ok(Document::Many(changes)) => Ok(changes),
        Ok(Document::One(change)) => Ok(vec![*change]),
        Err(error) => Err(InputError::Decode {
            source_name: source.to_string(),
            error,
        }),
    }
}

/// Read and decode every change in `source`.
pub async fn read_changes(source: &InputSource) -> Result<Vec<ChangeDescription>, InputError> {
    let content = match source {
        InputSource::Stdin => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map(|_| buf)
        }
        InputSource::File(path) => tokio::fs::read_to_string(path).await,
    }
    .map_err(|error| InputError::Read {
        source_name: source.to_string(),
        error,
    })?;

    let changes = parse_changes(&content, source)?;
    tracing::debug!(source = %source, count = changes.len(), "loaded change descriptions");
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"{
        "title": "Fix null check",
        "files": [{"filename": "a.ts", "status": "modified", "additions": 10, "deletions": 2}]
    }"#;

    #[test]
    fn parse_single_object() {
        let changes = parse_changes(ONE, &InputSource::Stdin).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].title, "Fix null check");
        assert_eq!(changes[0].base_branch, "main");
    }

    #[test]
    fn parse_array() {
        let json = format!("[{ONE}, {ONE}]");
        let changes = parse_changes(&json, &InputSource::Stdin).unwrap();
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn decode_error_names_source_and_field() {
        let source = InputSource::File(PathBuf::from("pr.json"));
        let err = parse_changes(r#"{"files": []}"#, &source).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("pr.json"), "got: {msg}");
        assert!(msg.contains("title"), "got: {msg}");
    }

    #[test]
    fn non_json_is_decode_error() {
        assert!(matches!(
            parse_changes("title: nope", &InputSource::Stdin),
            Err(InputError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pr.json");
        std::fs::write(&path, ONE).unwrap();

        let changes = read_changes(&InputSource::File(path)).await.unwrap();
        assert_eq!(changes[0].files[0].path, "a.ts");
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = InputSource::File(dir.path().join("missing.json"));
        assert!(matches!(
            read_changes(&source).await,
            Err(InputError::Read { .. })
        ));
    }
}
