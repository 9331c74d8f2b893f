//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

/// Help text shown under the usage line.
pub const ABOUT: &str = "Generate review context for pull requests: summary, risks, \
                         testing focus, and review priority.";
