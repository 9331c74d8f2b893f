//! prcontext — AI-generated review context for pull requests (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod env;
pub mod fingerprint;
pub mod input;
pub mod interpreter;
pub mod invoker;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod providers;
