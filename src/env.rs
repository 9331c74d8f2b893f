//! Environment variable access.
//!
//! Production code reads the process environment through [`Env::real()`].
//! Tests build an [`Env::mock()`] from a `HashMap` instead of mutating the
//! process environment, which would race between parallel tests.

use std::collections::HashMap;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Read from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Read only from the given pairs.
    #[cfg(test)]
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.overrides {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// The value of `name` if it is set and not blank.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Interpret `name` as a boolean switch.
    ///
    /// `Some(true)` for `true/1/yes/on`, `Some(false)` for `false/0/no/off`,
    /// `None` when unset or unrecognised.
    pub fn flag(&self, name: &str) -> Option<bool> {
        let val = self.var(name).ok()?;
        match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}
