//! The structured review context produced for a change.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How urgently a change needs reviewer attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Accepts the shapes models actually return for a priority.
///
/// Models tend to answer with `"HIGH - touches the auth layer"` or
/// `"Major"` rather than the bare lowercase level. The leading word decides
/// the level; anything unrecognisable is a decode error.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let leading: String = raw
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match leading.to_lowercase().as_str() {
            "low" | "minor" | "trivial" => Ok(Priority::Low),
            "medium" | "moderate" | "normal" => Ok(Priority::Medium),
            "high" | "major" | "important" => Ok(Priority::High),
            "critical" | "urgent" | "blocker" => Ok(Priority::Critical),
            _ => Err(serde::de::Error::custom(format!(
                "unknown review priority: {raw:?}"
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Review context for a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// High-level summary of the changes.
    pub summary: String,
    /// The problem the change solves.
    pub purpose: String,
    /// Scenarios reviewers should test.
    pub testing_focus: Vec<String>,
    /// Risks or concerns introduced by the change.
    pub potential_risks: Vec<String>,
    /// Modules, APIs, or subsystems touched.
    pub affected_areas: Vec<String>,
    pub review_priority: Priority,
    /// Free-form estimate, e.g. `"15-25 minutes"`.
    pub estimated_review_time: String,
    /// The most important individual changes.
    pub key_changes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn priority_accepts_justified_values() {
        let p: Priority = serde_json::from_str("\"HIGH - modifies 12 files in auth\"").unwrap();
        assert_eq!(p, Priority::High);
        let p: Priority = serde_json::from_str("\"Critical: schema migration\"").unwrap();
        assert_eq!(p, Priority::Critical);
        let p: Priority = serde_json::from_str("\"minor\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn priority_rejects_unknown() {
        assert!(serde_json::from_str::<Priority>("\"whenever\"").is_err());
        assert!(serde_json::from_str::<Priority>("\"\"").is_err());
    }

    #[test]
    fn priority_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"medium\"");
        assert_eq!(Priority::Critical.to_string(), "critical");
    }

    #[test]
    fn result_requires_every_field() {
        let json = r#"{"summary": "s", "purpose": "p"}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    #[test]
    fn result_field_names_are_stable() {
        let result = AnalysisResult {
            summary: "s".into(),
            purpose: "p".into(),
            testing_focus: vec![],
            potential_risks: vec![],
            affected_areas: vec![],
            review_priority: Priority::Low,
            estimated_review_time: "5-10 minutes".into(),
            key_changes: vec![],
        };
        let value = serde_json::to_value(&result).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "affected_areas",
                "estimated_review_time",
                "key_changes",
                "potential_risks",
                "purpose",
                "review_priority",
                "summary",
                "testing_focus",
            ]
        );
    }
}
