//! Configuration loading and layering.
//!
//! Handles `.prcontext.toml` loading, environment variable resolution,
//! and the config types the pipeline is built from.

pub mod loader;

pub use loader::{AnalysisConfig, CacheConfig, Config, ConfigError, LoggingConfig, ProviderConfig};
